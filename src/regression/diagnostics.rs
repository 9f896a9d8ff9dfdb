use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

/// How many of the most extreme observations to keep.
const TOP_OBSERVATIONS: usize = 3;

/// Summary statistics for residuals produced by a regression fit.
#[derive(Debug, Clone, Serialize)]
pub struct ResidualSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub max_abs: f64,
}

/// Highest-leverage and most influential observations (1-based row numbers
/// within the complete cases) with their rule-of-thumb thresholds.
#[derive(Debug, Clone, Serialize)]
pub struct InfluenceDiagnostics {
    pub leverage_threshold: f64,
    pub leverage: Vec<(usize, f64)>,
    pub cooks_threshold: f64,
    pub cooks_distance: Vec<(usize, f64)>,
}

pub(crate) fn summarize_residuals(residuals: &DVector<f64>) -> ResidualSummary {
    let n = residuals.len().max(1) as f64;
    let mean = residuals.iter().sum::<f64>() / n;

    let variance = residuals
        .iter()
        .map(|r| (r - mean) * (r - mean))
        .sum::<f64>()
        / n;

    let (min, max) = residuals
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            (lo.min(r), hi.max(r))
        });
    let max_abs = residuals.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()));

    ResidualSummary {
        mean,
        std_dev: variance.sqrt(),
        min,
        max,
        max_abs,
    }
}

/// Hat values and Cook's distances; `None` when the design leaves no residual
/// degrees of freedom or cannot be inverted.
pub(crate) fn leverage_and_influence(
    design: &DMatrix<f64>,
    residuals: &DVector<f64>,
) -> Option<InfluenceDiagnostics> {
    let n = design.nrows();
    let p = design.ncols();

    if p == 0 || residuals.len() != n || n <= p {
        return None;
    }

    let xtx_inverse = (design.transpose() * design).cholesky()?.inverse();

    let mse = residuals.norm_squared() / (n - p) as f64;
    if !mse.is_finite() || mse <= 0.0 {
        return None;
    }

    let mut leverage = Vec::with_capacity(n);
    let mut cooks_distance = Vec::with_capacity(n);

    for (idx, residual) in residuals.iter().copied().enumerate() {
        let row = design.row(idx);
        let hat = (row * &xtx_inverse * row.transpose())[(0, 0)];
        if !hat.is_finite() {
            return None;
        }
        leverage.push((idx + 1, hat));

        // Undefined at leverage 1.
        if hat >= 1.0 {
            continue;
        }

        let cooks = (residual * residual) / (mse * p as f64) * (hat / (1.0 - hat).powi(2));
        if cooks.is_finite() {
            cooks_distance.push((idx + 1, cooks));
        }
    }

    let descending =
        |a: &(usize, f64), b: &(usize, f64)| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal);
    leverage.sort_by(descending);
    cooks_distance.sort_by(descending);
    leverage.truncate(TOP_OBSERVATIONS);
    cooks_distance.truncate(TOP_OBSERVATIONS);

    Some(InfluenceDiagnostics {
        leverage_threshold: (2.0 * p as f64 / n as f64).min(0.99),
        leverage,
        cooks_threshold: 4.0 / n as f64,
        cooks_distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn residual_summary_tracks_extremes() {
        let residuals = DVector::from_vec(vec![-2.0, 1.0, 0.5, 0.5]);
        let summary = summarize_residuals(&residuals);

        assert_abs_diff_eq!(summary.mean, 0.0, epsilon = 1e-12);
        assert_eq!(summary.min, -2.0);
        assert_eq!(summary.max, 1.0);
        assert_eq!(summary.max_abs, 2.0);
        assert_abs_diff_eq!(summary.std_dev, (5.5f64 / 4.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn outlying_design_point_has_highest_leverage() {
        let design = DMatrix::from_row_slice(
            6,
            2,
            &[1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 1.0, 4.0, 1.0, 5.0, 1.0, 20.0],
        );
        let residuals = DVector::from_vec(vec![0.1, -0.2, 0.1, 0.2, -0.1, 0.5]);
        let influence = leverage_and_influence(&design, &residuals).expect("diagnostics");

        assert_eq!(influence.leverage[0].0, 6);
        assert_eq!(influence.cooks_distance[0].0, 6);
        assert_eq!(influence.leverage.len(), 3);
        assert_abs_diff_eq!(influence.cooks_threshold, 4.0 / 6.0, epsilon = 1e-12);
        assert!(influence.leverage.iter().all(|(_, h)| *h > 0.0 && *h < 1.0));
    }

    #[test]
    fn no_diagnostics_without_residual_degrees_of_freedom() {
        let design = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 2.0]);
        let residuals = DVector::from_vec(vec![0.0, 0.0]);
        assert!(leverage_and_influence(&design, &residuals).is_none());
    }
}
