use tracing::debug;

use super::evaluate::{evaluate_model, EvalOptions, FitReport};
use crate::dataset::Dataset;
use crate::regression::{self, FitOptions, FitResult, ModelSpec, Term, Transform};

/// A response regressed on one transformed explanatory column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformCandidate {
    pub response: Term,
    pub explanatory: String,
    pub transform: Transform,
}

impl TransformCandidate {
    pub fn new(response: Term, explanatory: impl Into<String>, transform: Transform) -> Self {
        Self {
            response,
            explanatory: explanatory.into(),
            transform,
        }
    }

    pub fn label(&self) -> &'static str {
        self.transform.label()
    }

    pub fn spec(&self) -> ModelSpec {
        ModelSpec::new(
            self.response.clone(),
            vec![Term::new(self.explanatory.clone(), self.transform)],
        )
    }
}

/// Fit and score one candidate, surfacing the failure if there is one.
pub fn attempt(
    candidate: &TransformCandidate,
    data: &Dataset,
    options: EvalOptions,
) -> FitResult<FitReport> {
    let model = regression::fit(&candidate.spec(), data, FitOptions::quiet())?;
    let mut report = evaluate_model(&model, options)?;
    report.label = candidate.label().to_string();
    report.model = None;
    Ok(report)
}

/// Fit and score one candidate; a failed fit becomes a row with every metric missing.
pub fn fit_transformation(
    candidate: &TransformCandidate,
    data: &Dataset,
    options: EvalOptions,
) -> FitReport {
    attempt(candidate, data, options).unwrap_or_else(|err| {
        debug!(
            candidate = %candidate.spec(),
            error = %err,
            "transformation could not be fit"
        );
        FitReport::missing(candidate.label())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::regression::FitError;

    fn data() -> Dataset {
        Dataset::new(vec![
            Column::numeric("y", vec![2.0, 4.1, 5.9, 8.2, 9.9, 12.1]),
            Column::numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn successful_attempt_is_labelled_by_transformation() {
        let candidate = TransformCandidate::new(Term::identity("y"), "x", Transform::Square);
        let report = attempt(&candidate, &data(), EvalOptions::default()).unwrap();

        assert_eq!(report.label, "Square");
        assert!(report.model.is_none());
        assert_eq!(report.terms, Some(1));
        assert!(report.rmse.is_some());
    }

    #[test]
    fn failed_fit_yields_all_missing_row() {
        let candidate = TransformCandidate::new(Term::identity("y"), "x", Transform::Ln);

        assert!(matches!(
            attempt(&candidate, &data(), EvalOptions::default()),
            Err(FitError::Domain { .. })
        ));

        let report = fit_transformation(&candidate, &data(), EvalOptions::default());
        assert_eq!(report, FitReport::missing("Log"));
    }

    #[test]
    fn unknown_column_is_contained() {
        let candidate = TransformCandidate::new(Term::identity("y"), "nope", Transform::Identity);
        let report = fit_transformation(&candidate, &data(), EvalOptions::default());
        assert!(report.is_missing());
        assert_eq!(report.label, "Linear");
    }
}
