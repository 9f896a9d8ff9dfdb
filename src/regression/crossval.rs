//! Cross-validated prediction error for fitted linear models.
//!
//! Errors are measured in the model's response space and pooled across all
//! held-out observations.

use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::{FitError, FitResult};
use super::solve::{solve_linear, SINGULAR_TOLERANCE};
use super::{FitOptions, LinearModel};

pub const KFOLD_FOLDS: usize = 10;
pub const KFOLD_REPEATS: u64 = 10;

const INTERVAL_Z: f64 = 1.96;

/// Outcome of repeated k-fold cross-validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KFoldSummary {
    pub folds: usize,
    /// `(seed, mse)` for every run that completed.
    pub runs: Vec<(u64, f64)>,
    pub mean_mse: f64,
}

impl KFoldSummary {
    /// Half-width of the approximate 95% prediction interval, `1.96 * sqrt(mse)`.
    pub fn half_width_95(&self) -> f64 {
        INTERVAL_Z * self.mean_mse.sqrt()
    }
}

/// Leave-one-out cross-validated MSE.
pub fn leave_one_out(model: &LinearModel, options: FitOptions) -> FitResult<f64> {
    cross_validate(model, model.observations(), 0, options)
}

/// Repeated k-fold cross-validation seeded with `1..=repeats`.
///
/// Runs whose folds cannot be solved are skipped; fails only when every run does.
pub fn repeated_kfold(
    model: &LinearModel,
    folds: usize,
    repeats: u64,
    options: FitOptions,
) -> FitResult<KFoldSummary> {
    let mut runs = Vec::with_capacity(repeats as usize);
    let mut last_error = None;

    for seed in 1..=repeats {
        match cross_validate(model, folds, seed, options) {
            Ok(mse) => runs.push((seed, mse)),
            Err(err) => {
                debug!(seed, error = %err, "skipping cross-validation run");
                last_error = Some(err);
            }
        }
    }

    if runs.is_empty() {
        return Err(last_error.unwrap_or(FitError::InvalidFolds {
            folds,
            rows: model.observations(),
        }));
    }

    let mean_mse = runs.iter().map(|(_, mse)| mse).sum::<f64>() / runs.len() as f64;

    Ok(KFoldSummary {
        folds,
        runs,
        mean_mse,
    })
}

/// Cross-validated MSE with `folds` folds assigned by a generator seeded with `seed`.
pub fn cross_validate(
    model: &LinearModel,
    folds: usize,
    seed: u64,
    options: FitOptions,
) -> FitResult<f64> {
    let design = model.design();
    let response = model.response();
    let n = design.nrows();

    if folds < 2 || folds > n {
        return Err(FitError::InvalidFolds { folds, rows: n });
    }

    let assignment = assign_folds(n, folds, seed);
    let mut squared_error = 0.0;

    for fold in 0..folds {
        let (train, test): (Vec<usize>, Vec<usize>) =
            (0..n).partition(|&i| assignment[i] != fold);

        let coefficients = fit_fold(design, response, &train, options)?;
        for &i in &test {
            let predicted = design.row(i).dot(&coefficients.transpose());
            let error = response[i] - predicted;
            squared_error += error * error;
        }
    }

    let mse = squared_error / n as f64;
    if mse.is_finite() {
        Ok(mse)
    } else {
        Err(FitError::NonFiniteMetric("cross-validated MSE"))
    }
}

/// Balanced fold labels `0..folds`, shuffled deterministically.
pub(crate) fn assign_folds(n: usize, folds: usize, seed: u64) -> Vec<usize> {
    let mut labels: Vec<usize> = (0..n).map(|i| i % folds).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    labels.shuffle(&mut rng);
    labels
}

/// Fit on the training rows. Columns that are linearly dependent on earlier
/// columns there (a level absent from the fold, a dummy duplicating the
/// intercept) are aliased: dropped from the solve, coefficient zero.
fn fit_fold(
    design: &DMatrix<f64>,
    response: &DVector<f64>,
    train: &[usize],
    options: FitOptions,
) -> FitResult<DVector<f64>> {
    let train_design = design.select_rows(train);
    let train_response = response.select_rows(train);

    let kept = independent_columns(&train_design);

    if kept.len() < design.ncols() && !options.suppress_warnings {
        warn!(
            aliased = design.ncols() - kept.len(),
            "training fold is rank-deficient; aliased coefficients set to zero"
        );
    }

    if kept.is_empty() || train.len() <= kept.len() {
        return Err(FitError::InsufficientData {
            rows: train.len(),
            cols: kept.len(),
        });
    }

    let solution = solve_linear(&train_design.select_columns(&kept), &train_response)?;

    let mut coefficients = DVector::zeros(design.ncols());
    for (value, &j) in solution.coefficients.iter().zip(&kept) {
        coefficients[j] = *value;
    }
    Ok(coefficients)
}

/// Indices of columns not spanned by the columns kept before them.
///
/// Each unit-norm column is orthogonalized against the kept basis (modified
/// Gram-Schmidt). The squared residual norm is the Cholesky pivot the solver
/// would see, so one below the singularity threshold marks it as aliased.
fn independent_columns(matrix: &DMatrix<f64>) -> Vec<usize> {
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut kept = Vec::new();

    for j in 0..matrix.ncols() {
        let norm = matrix.column(j).norm();
        if !norm.is_finite() || norm == 0.0 {
            continue;
        }

        let mut residual: DVector<f64> = matrix.column(j).unscale(norm);
        for q in &basis {
            let projection = q.dot(&residual);
            residual.axpy(-projection, q, 1.0);
        }

        let remaining = residual.norm();
        if remaining * remaining >= SINGULAR_TOLERANCE {
            basis.push(residual.unscale(remaining));
            kept.push(j);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, Dataset};
    use crate::regression::{fit, ModelSpec};
    use approx::assert_abs_diff_eq;

    fn noisy_line() -> LinearModel {
        let x: Vec<f64> = (0..30).map(f64::from).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 1.0 + 0.5 * v + if i % 2 == 0 { 0.3 } else { -0.3 })
            .collect();
        let data = Dataset::new(vec![Column::numeric("y", y), Column::numeric("x", x)]).unwrap();
        let spec: ModelSpec = "y ~ x".parse().unwrap();
        fit(&spec, &data, FitOptions::quiet()).unwrap()
    }

    #[test]
    fn folds_are_balanced_and_reproducible() {
        let first = assign_folds(23, 10, 7);
        let second = assign_folds(23, 10, 7);
        assert_eq!(first, second);
        assert_ne!(first, assign_folds(23, 10, 8));

        for fold in 0..10 {
            let size = first.iter().filter(|&&f| f == fold).count();
            assert!(size == 2 || size == 3);
        }
    }

    #[test]
    fn leave_one_out_matches_press_statistic() {
        let model = noisy_line();
        let loocv = leave_one_out(&model, FitOptions::quiet()).unwrap();

        let press = {
            let design = model.design();
            let xtx_inv = (design.transpose() * design).try_inverse().unwrap();
            let residuals = model.residuals();
            (0..model.observations())
                .map(|i| {
                    let row = design.row(i);
                    let hat = (row * &xtx_inv * row.transpose())[(0, 0)];
                    (residuals[i] / (1.0 - hat)).powi(2)
                })
                .sum::<f64>()
                / model.observations() as f64
        };

        assert_abs_diff_eq!(loocv, press, epsilon = 1e-9);
    }

    #[test]
    fn cross_validated_error_exceeds_in_sample_error() {
        let model = noisy_line();
        let in_sample = model.metrics().rss / model.observations() as f64;
        let summary =
            repeated_kfold(&model, KFOLD_FOLDS, KFOLD_REPEATS, FitOptions::quiet()).unwrap();

        assert_eq!(summary.runs.len(), 10);
        assert_eq!(summary.runs[0].0, 1);
        assert!(summary.mean_mse > in_sample);
        assert_abs_diff_eq!(
            summary.half_width_95(),
            1.96 * summary.mean_mse.sqrt(),
            epsilon = 1e-12
        );

        let again =
            repeated_kfold(&model, KFOLD_FOLDS, KFOLD_REPEATS, FitOptions::quiet()).unwrap();
        assert_eq!(summary, again);
    }

    #[test]
    fn rejects_impossible_fold_counts() {
        let model = noisy_line();
        assert_eq!(
            cross_validate(&model, 31, 1, FitOptions::quiet()).unwrap_err(),
            FitError::InvalidFolds { folds: 31, rows: 30 }
        );
        assert!(cross_validate(&model, 1, 1, FitOptions::quiet()).is_err());
    }

    #[test]
    fn absent_levels_are_aliased_within_a_fold() {
        let mut group = vec![Some("a"); 12];
        group[5] = Some("b");
        group[11] = Some("b");
        let y: Vec<f64> = (0..12).map(|i| f64::from(i) * 0.7 + (i % 3) as f64).collect();
        let x: Vec<f64> = (0..12).map(f64::from).collect();
        let data = Dataset::new(vec![
            Column::numeric("y", y),
            Column::numeric("x", x),
            Column::categorical("g", group),
        ])
        .unwrap();
        let model = fit(&"y ~ x + g".parse().unwrap(), &data, FitOptions::quiet()).unwrap();

        // With four folds some training split may hold no "b" rows.
        let mse = cross_validate(&model, 4, 3, FitOptions::quiet()).unwrap();
        assert!(mse.is_finite());
    }

    #[test]
    fn baseline_level_held_out_is_aliased() {
        // The baseline "a" appears once; leaving it out turns the "g[b]"
        // dummy into a copy of the intercept.
        let mut group = vec![Some("b"); 12];
        group[4] = Some("a");
        let x: Vec<f64> = (0..12).map(f64::from).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|v| 2.0 + 0.4 * v + 0.2 * (v * 1.3).sin())
            .collect();
        let data = Dataset::new(vec![
            Column::numeric("y", y),
            Column::numeric("x", x),
            Column::categorical("g", group),
        ])
        .unwrap();
        let model = fit(&"y ~ x + g".parse().unwrap(), &data, FitOptions::quiet()).unwrap();

        let loocv = leave_one_out(&model, FitOptions::quiet()).unwrap();
        assert!(loocv.is_finite());

        let summary =
            repeated_kfold(&model, KFOLD_FOLDS, KFOLD_REPEATS, FitOptions::quiet()).unwrap();
        assert_eq!(summary.runs.len(), 10);
    }

    #[test]
    fn dependent_columns_are_skipped_in_order() {
        let matrix = DMatrix::from_row_slice(
            4,
            4,
            &[
                1.0, 1.0, 0.0, 2.0, //
                1.0, 1.0, 0.0, 3.0, //
                1.0, 1.0, 0.0, 5.0, //
                1.0, 1.0, 0.0, 7.0,
            ],
        );
        assert_eq!(independent_columns(&matrix), vec![0, 3]);
    }
}
