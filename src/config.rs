use std::path::PathBuf;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{CommonArgs, CompareArgs, EvaluateArgs, ResponseArgs, ScanArgs};
use crate::dataset::DEFAULT_MISSING_MARKERS;
use crate::regression::{ModelSpec, Term};
use crate::{OutputFormat, TargetMetric};

/// What a run computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mode {
    Evaluate { formula: String },
    Compare { explanatory: String },
    Scan { include_response: bool },
}

/// Runtime configuration compiled from CLI input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub dataset: PathBuf,
    pub mode: Mode,
    /// Response column and its transformation; unused in evaluate mode,
    /// where the formula names the response.
    pub response: Option<Term>,
    pub metric: TargetMetric,
    pub loocv: bool,
    pub kfold: bool,
    pub missing: Vec<String>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub dry_run: bool,
}

impl RunConfig {
    pub fn from_evaluate_args(args: EvaluateArgs) -> Self {
        Self::base(
            args.common,
            Mode::Evaluate {
                formula: args.formula,
            },
            None,
            TargetMetric::default(),
            args.loocv,
            args.kfold,
        )
    }

    pub fn from_compare_args(args: CompareArgs) -> Self {
        let (response, metric) = response_parts(args.response);
        Self::base(
            args.common,
            Mode::Compare {
                explanatory: args.explanatory,
            },
            Some(response),
            metric,
            args.loocv,
            args.kfold,
        )
    }

    pub fn from_scan_args(args: ScanArgs) -> Self {
        let (response, metric) = response_parts(args.response);
        Self::base(
            args.common,
            Mode::Scan {
                include_response: !args.exclude_response,
            },
            Some(response),
            metric,
            false,
            false,
        )
    }

    fn base(
        common: CommonArgs,
        mode: Mode,
        response: Option<Term>,
        metric: TargetMetric,
        loocv: bool,
        kfold: bool,
    ) -> Self {
        Self {
            dataset: common.dataset,
            mode,
            response,
            metric,
            loocv,
            kfold,
            missing: common.missing,
            output: common.output,
            format: common.format,
            dry_run: common.dry_run,
        }
    }

    /// Fill in defaults (e.g. missing-value markers) when the user omitted them.
    pub fn with_defaults(mut self) -> Self {
        if self.missing.is_empty() {
            self.missing = DEFAULT_MISSING_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        match &self.mode {
            Mode::Evaluate { formula } => {
                if let Err(err) = formula.parse::<ModelSpec>() {
                    bail!("invalid formula '{}': {}", formula, err);
                }
            }
            Mode::Compare { explanatory } => {
                ensure!(
                    !explanatory.trim().is_empty(),
                    "explanatory column must be provided"
                );
            }
            Mode::Scan { .. } => {}
        }

        if !matches!(self.mode, Mode::Evaluate { .. }) {
            let response = self.response.as_ref().map(|t| t.column.trim());
            ensure!(
                response.is_some_and(|r| !r.is_empty()),
                "response column must be provided"
            );
        }

        if !self.dry_run && !self.dataset.exists() {
            bail!(
                "Dataset '{}' does not exist; use --dry-run to preview without the file",
                self.dataset.display()
            );
        }

        Ok(())
    }

    pub fn model_spec(&self) -> Result<Option<ModelSpec>> {
        match &self.mode {
            Mode::Evaluate { formula } => Ok(Some(formula.parse()?)),
            _ => Ok(None),
        }
    }

    pub fn summary(&self) -> String {
        let task = match &self.mode {
            Mode::Evaluate { formula } => format!("evaluate {}", formula),
            Mode::Compare { explanatory } => {
                format!("compare transformations of '{}'", explanatory)
            }
            Mode::Scan { include_response } => format!(
                "scan all columns ({} response column)",
                if *include_response {
                    "including"
                } else {
                    "excluding"
                }
            ),
        };

        let response = self
            .response
            .as_ref()
            .map(Term::to_string)
            .unwrap_or_else(|| "from formula".to_string());

        let cross_validation = match (self.loocv, self.kfold) {
            (false, false) => "none".to_string(),
            (true, false) => "leave-one-out".to_string(),
            (false, true) => "repeated 10-fold".to_string(),
            (true, true) => "leave-one-out, repeated 10-fold".to_string(),
        };

        format!(
            concat!(
                "Task: {}\n",
                "Dataset: {}\n",
                "Response: {}\n",
                "Ranking metric: {}\n",
                "Cross-validation: {}\n",
                "Missing markers: {}"
            ),
            task,
            self.dataset.display(),
            response,
            self.metric,
            cross_validation,
            self.missing
                .iter()
                .map(|m| format!("{:?}", m))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

fn response_parts(args: ResponseArgs) -> (Term, TargetMetric) {
    (
        Term::new(args.response, args.response_transform),
        args.metric,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::Transform;

    fn compare_config() -> RunConfig {
        RunConfig {
            dataset: PathBuf::from("missing.csv"),
            mode: Mode::Compare {
                explanatory: "area".into(),
            },
            response: Some(Term::new("price", Transform::Ln)),
            metric: TargetMetric::Bic,
            loocv: true,
            kfold: false,
            missing: Vec::new(),
            output: None,
            format: OutputFormat::Text,
            dry_run: true,
        }
    }

    #[test]
    fn defaults_fill_missing_markers() {
        let config = compare_config().with_defaults();
        assert_eq!(config.missing, vec!["".to_string(), "NA".to_string()]);
    }

    #[test]
    fn dry_run_skips_dataset_existence_check() {
        let config = compare_config().with_defaults();
        config.validate().expect("dry run is valid");

        let mut real = config.clone();
        real.dry_run = false;
        let err = real.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn rejects_bad_formula_and_empty_response() {
        let mut config = compare_config();
        config.mode = Mode::Evaluate {
            formula: "price area".into(),
        };
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("invalid formula"));

        let mut config = compare_config();
        config.response = Some(Term::identity("  "));
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("response column must be provided"));
    }

    #[test]
    fn summary_mentions_task_and_metric() {
        let summary = compare_config().with_defaults().summary();
        assert!(summary.contains("compare transformations of 'area'"));
        assert!(summary.contains("Response: log(price)"));
        assert!(summary.contains("Ranking metric: BIC"));
        assert!(summary.contains("Cross-validation: leave-one-out"));
    }
}
