pub mod crossval;
mod diagnostics;
mod error;
mod formula;
mod preprocess;
mod solve;

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::dataset::Dataset;

pub use crossval::KFoldSummary;
pub use diagnostics::{InfluenceDiagnostics, ResidualSummary};
pub use error::{FitError, FitResult};
pub use formula::{FormulaError, ModelSpec, Term, Transform};
pub use solve::RegressionMetrics;

/// Options passed to a single fitting call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitOptions {
    /// Silence numerical warnings (near-singular designs, rank-deficient folds).
    pub suppress_warnings: bool,
}

impl FitOptions {
    pub fn quiet() -> Self {
        Self {
            suppress_warnings: true,
        }
    }
}

/// An ordinary least squares fit together with the data it was fit on.
#[derive(Debug, Clone)]
pub struct LinearModel {
    spec: ModelSpec,
    labels: Vec<String>,
    design: DMatrix<f64>,
    response: DVector<f64>,
    raw_response: DVector<f64>,
    coefficients: DVector<f64>,
    fitted: DVector<f64>,
    metrics: RegressionMetrics,
}

/// Fit `spec` against `data` by ordinary least squares.
///
/// Rows with a missing value in any referenced column are dropped.
pub fn fit(spec: &ModelSpec, data: &Dataset, options: FitOptions) -> FitResult<LinearModel> {
    let design = preprocess::build_design(spec, data)?;
    let solution = solve::solve_linear(&design.matrix, &design.response)?;

    if solution.min_pivot < solve::CONDITION_WARNING && !options.suppress_warnings {
        warn!(
            formula = %spec,
            pivot = solution.min_pivot,
            "design matrix is near-singular; estimates may be unstable"
        );
    }

    let fitted = &design.matrix * &solution.coefficients;
    let metrics = solve::compute_metrics(&design.response, &fitted, design.labels.len())?;

    Ok(LinearModel {
        spec: spec.clone(),
        labels: design.labels,
        design: design.matrix,
        response: design.response,
        raw_response: design.raw_response,
        coefficients: solution.coefficients,
        fitted,
        metrics,
    })
}

impl LinearModel {
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn observations(&self) -> usize {
        self.design.nrows()
    }

    /// Number of predictor columns, intercept excluded.
    pub fn term_count(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> Vec<(&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.coefficients.iter().copied())
            .collect()
    }

    pub fn metrics(&self) -> &RegressionMetrics {
        &self.metrics
    }

    /// Fitted values in the model's (transformed) response space.
    pub fn fitted(&self) -> &DVector<f64> {
        &self.fitted
    }

    pub fn residuals(&self) -> DVector<f64> {
        &self.response - &self.fitted
    }

    /// Fitted values mapped back into the response's original units.
    pub fn fitted_original_units(&self) -> FitResult<DVector<f64>> {
        let transform = self.spec.response.transform;
        let values = self
            .fitted
            .iter()
            .map(|&v| {
                transform
                    .inverse(v)
                    .ok_or(FitError::NonFiniteMetric("back-transformed fitted value"))
            })
            .collect::<FitResult<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }

    /// Root-mean-square error in the response's original units.
    pub fn rmse_original_units(&self) -> FitResult<f64> {
        let predicted = self.fitted_original_units()?;
        let mse = (&self.raw_response - predicted).norm_squared() / self.observations() as f64;
        let rmse = mse.sqrt();
        if rmse.is_finite() {
            Ok(rmse)
        } else {
            Err(FitError::NonFiniteMetric("RMSE"))
        }
    }

    pub fn residual_summary(&self) -> ResidualSummary {
        diagnostics::summarize_residuals(&self.residuals())
    }

    pub fn influence(&self) -> Option<InfluenceDiagnostics> {
        diagnostics::leverage_and_influence(&self.design, &self.residuals())
    }

    pub(crate) fn design(&self) -> &DMatrix<f64> {
        &self.design
    }

    pub(crate) fn response(&self) -> &DVector<f64> {
        &self.response
    }
}
