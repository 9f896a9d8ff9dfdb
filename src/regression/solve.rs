use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use super::error::{FitError, FitResult};

/// Scaled Cholesky pivots below this are treated as exact collinearity.
pub(crate) const SINGULAR_TOLERANCE: f64 = 1e-10;
/// Scaled Cholesky pivots below this trigger a near-singularity warning.
pub(crate) const CONDITION_WARNING: f64 = 1e-7;

#[derive(Debug, Clone, Serialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub adj_r2: Option<f64>,
    pub rss: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub aicc: Option<f64>,
    pub bic: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Solution {
    pub coefficients: DVector<f64>,
    /// Smallest pivot of the Cholesky factor of the unit-diagonal Gram matrix.
    pub min_pivot: f64,
}

/// Ordinary least squares via the normal equations.
///
/// Columns are scaled to unit norm before factoring so the pivots measure
/// collinearity rather than column magnitude.
pub(crate) fn solve_linear(design: &DMatrix<f64>, target: &DVector<f64>) -> FitResult<Solution> {
    let cols = design.ncols();
    let norms: Vec<f64> = (0..cols).map(|j| design.column(j).norm()).collect();
    if norms.iter().any(|n| !n.is_finite() || *n == 0.0) {
        return Err(FitError::Singular);
    }

    let mut scaled = design.clone();
    for (j, norm) in norms.iter().enumerate() {
        scaled.column_mut(j).unscale_mut(*norm);
    }

    let gram = scaled.transpose() * &scaled;
    let rhs = scaled.transpose() * target;

    let chol = gram.cholesky().ok_or(FitError::Singular)?;

    let min_pivot = chol
        .l_dirty()
        .diagonal()
        .iter()
        .map(|d| d * d)
        .fold(f64::INFINITY, f64::min);
    if min_pivot.is_nan() || min_pivot < SINGULAR_TOLERANCE {
        return Err(FitError::Singular);
    }

    let mut coefficients = chol.solve(&rhs);
    for (j, norm) in norms.iter().enumerate() {
        coefficients[j] /= norm;
    }

    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(FitError::Singular);
    }

    Ok(Solution {
        coefficients,
        min_pivot,
    })
}

/// Goodness-of-fit statistics for a Gaussian linear model with
/// `coefficient_count` coefficients, intercept included.
pub(crate) fn compute_metrics(
    actual: &DVector<f64>,
    predicted: &DVector<f64>,
    coefficient_count: usize,
) -> FitResult<RegressionMetrics> {
    let n = actual.len();
    if n == 0 {
        return Err(FitError::InsufficientData {
            rows: 0,
            cols: coefficient_count,
        });
    }

    let residuals = actual - predicted;
    let rss = residuals.iter().map(|r| r * r).sum::<f64>();

    let mean_actual = actual.iter().sum::<f64>() / n as f64;
    let ss_tot = actual
        .iter()
        .map(|value| {
            let diff = value - mean_actual;
            diff * diff
        })
        .sum::<f64>();

    if !rss.is_finite() {
        return Err(FitError::NonFiniteMetric("residual sum of squares"));
    }
    if !(ss_tot.is_finite() && ss_tot > 0.0) {
        return Err(FitError::NonFiniteMetric("R^2 (response has zero variance)"));
    }

    let n_f = n as f64;
    let r2 = 1.0 - (rss / ss_tot);

    let adj_r2 = if n > coefficient_count {
        let numerator = (1.0 - r2) * (n_f - 1.0);
        let denominator = n_f - coefficient_count as f64;
        Some(1.0 - numerator / denominator)
    } else {
        None
    };

    let criteria = information_criteria(rss, n, coefficient_count);

    Ok(RegressionMetrics {
        r2,
        adj_r2,
        rss,
        log_likelihood: criteria.log_likelihood,
        aic: criteria.aic,
        aicc: criteria.aicc,
        bic: criteria.bic,
    })
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct InformationCriteria {
    pub log_likelihood: f64,
    pub aic: f64,
    pub aicc: Option<f64>,
    pub bic: f64,
}

/// Gaussian log-likelihood based criteria.
///
/// The parameter count is `coefficient_count + 1` since the residual variance
/// is estimated too. A perfect fit yields negative infinity.
pub(crate) fn information_criteria(
    rss: f64,
    n: usize,
    coefficient_count: usize,
) -> InformationCriteria {
    let n_f = n as f64;
    let k = (coefficient_count + 1) as f64;

    let log_likelihood = if rss == 0.0 {
        f64::INFINITY
    } else {
        -0.5 * n_f * ((2.0 * PI).ln() + (rss / n_f).ln() + 1.0)
    };

    let aic = -2.0 * log_likelihood + 2.0 * k;
    let bic = -2.0 * log_likelihood + k * n_f.ln();
    let aicc = (n_f - k - 1.0 > 0.0).then(|| aic + (2.0 * k * (k + 1.0)) / (n_f - k - 1.0));

    InformationCriteria {
        log_likelihood,
        aic,
        aicc,
        bic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_design_and_target() -> (DMatrix<f64>, DVector<f64>) {
        let design = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let target = DVector::from_vec(vec![1.0, 3.0, 5.0]);
        (design, target)
    }

    #[test]
    fn solve_linear_recovers_exact_coefficients() {
        let (design, target) = sample_design_and_target();
        let solution = solve_linear(&design, &target).expect("ols solution");

        assert_abs_diff_eq!(solution.coefficients[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(solution.coefficients[1], 2.0, epsilon = 1e-10);
        assert!(solution.min_pivot > CONDITION_WARNING);
    }

    #[test]
    fn solve_linear_is_scale_invariant() {
        let design = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1e6, 1.0, 2e6]);
        let target = DVector::from_vec(vec![1.0, 3.0, 5.0]);
        let solution = solve_linear(&design, &target).expect("ols solution");

        assert_abs_diff_eq!(solution.coefficients[1], 2e-6, epsilon = 1e-14);
    }

    #[test]
    fn solve_linear_rejects_collinear_columns() {
        let constant = DMatrix::from_row_slice(3, 2, &[1.0, 4.0, 1.0, 4.0, 1.0, 4.0]);
        let target = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(
            solve_linear(&constant, &target).unwrap_err(),
            FitError::Singular
        );

        let zero = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(solve_linear(&zero, &target).unwrap_err(), FitError::Singular);
    }

    #[test]
    fn compute_metrics_handles_perfect_fit() {
        let actual = DVector::from_vec(vec![1.0, 3.0, 5.0, 7.0]);
        let predicted = actual.clone();
        let metrics = compute_metrics(&actual, &predicted, 2).expect("metrics");

        assert_abs_diff_eq!(metrics.r2, 1.0, epsilon = 1e-12);
        assert_eq!(metrics.adj_r2, Some(1.0));
        assert_eq!(metrics.bic, f64::NEG_INFINITY);
    }

    #[test]
    fn compute_metrics_rejects_zero_variance_targets() {
        let actual = DVector::from_vec(vec![2.0, 2.0, 2.0]);
        let predicted = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let err = compute_metrics(&actual, &predicted, 1).unwrap_err();
        assert!(err.to_string().contains("zero variance"));
    }

    #[test]
    fn information_criteria_match_gaussian_likelihood() {
        // RSS = 10, n = 100, two coefficients plus sigma.
        let ic = information_criteria(10.0, 100, 2);
        let expected_ll = -50.0 * ((2.0 * PI).ln() + (0.1f64).ln() + 1.0);

        assert_abs_diff_eq!(ic.log_likelihood, expected_ll, epsilon = 1e-10);
        assert_abs_diff_eq!(ic.aic, -2.0 * expected_ll + 6.0, epsilon = 1e-10);
        assert_abs_diff_eq!(ic.bic, -2.0 * expected_ll + 3.0 * 100f64.ln(), epsilon = 1e-10);
        assert_abs_diff_eq!(ic.aicc.unwrap(), ic.aic + 24.0 / 96.0, epsilon = 1e-10);
    }

    #[test]
    fn aicc_requires_enough_observations() {
        let ic = information_criteria(1.0, 4, 2);
        assert!(ic.aicc.is_none());
        assert!(information_criteria(1.0, 5, 2).aicc.is_some());
    }
}
