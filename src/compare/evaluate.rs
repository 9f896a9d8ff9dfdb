use serde::Serialize;

use crate::regression::crossval::{self, KFOLD_FOLDS, KFOLD_REPEATS};
use crate::regression::{FitOptions, FitResult, KFoldSummary, LinearModel};
use crate::TargetMetric;

/// Which cross-validated scores to compute alongside the in-sample metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvalOptions {
    pub loocv: bool,
    pub kfold: bool,
}

/// One row of a comparison table. Every numeric field is `None` when the
/// underlying fit failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub label: String,
    pub model: Option<String>,
    pub terms: Option<usize>,
    pub adj_r_squared: Option<f64>,
    pub bic: Option<f64>,
    pub aicc: Option<f64>,
    pub rmse: Option<f64>,
    pub loocv_mse: Option<f64>,
    pub kfold: Option<KFoldSummary>,
}

impl FitReport {
    /// Row for a candidate that could not be fit.
    pub fn missing(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            model: None,
            terms: None,
            adj_r_squared: None,
            bic: None,
            aicc: None,
            rmse: None,
            loocv_mse: None,
            kfold: None,
        }
    }

    pub fn metric(&self, target: TargetMetric) -> Option<f64> {
        match target {
            TargetMetric::Rmse => self.rmse,
            TargetMetric::Bic => self.bic,
            TargetMetric::Aicc => self.aicc,
        }
    }

    pub fn kfold_mse(&self) -> Option<f64> {
        self.kfold.as_ref().map(|k| k.mean_mse)
    }

    /// True when no metric is missing, counting cross-validated scores only
    /// if they were requested.
    pub fn is_complete(&self, options: EvalOptions) -> bool {
        self.terms.is_some()
            && self.adj_r_squared.is_some()
            && self.bic.is_some()
            && self.aicc.is_some()
            && self.rmse.is_some()
            && (!options.loocv || self.loocv_mse.is_some())
            && (!options.kfold || self.kfold.is_some())
    }

    pub fn is_missing(&self) -> bool {
        self.terms.is_none()
            && self.adj_r_squared.is_none()
            && self.bic.is_none()
            && self.aicc.is_none()
            && self.rmse.is_none()
            && self.loocv_mse.is_none()
            && self.kfold.is_none()
    }
}

/// Score a fitted model.
///
/// RMSE is taken in the response's original units; cross-validated errors in
/// the model's response space. Numerical warnings are suppressed, and a
/// cross-validation scheme that cannot run leaves its field empty.
pub fn evaluate_model(model: &LinearModel, options: EvalOptions) -> FitResult<FitReport> {
    let quiet = FitOptions::quiet();
    let metrics = model.metrics();
    let description = model.spec().to_string();

    let loocv_mse = options
        .loocv
        .then(|| crossval::leave_one_out(model, quiet).ok())
        .flatten();
    let kfold = options
        .kfold
        .then(|| crossval::repeated_kfold(model, KFOLD_FOLDS, KFOLD_REPEATS, quiet).ok())
        .flatten();

    Ok(FitReport {
        label: description.clone(),
        model: Some(description),
        terms: Some(model.term_count()),
        adj_r_squared: metrics.adj_r2,
        bic: Some(metrics.bic),
        aicc: metrics.aicc,
        rmse: Some(model.rmse_original_units()?),
        loocv_mse,
        kfold,
    })
}
