mod cli;
pub mod compare;
pub mod config;
pub mod dataset;
pub mod regression;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use cli::{Cli, Commands};
use compare::{EvalOptions, ModelEvaluation, Report, ReportBody, ScanOptions};
use config::{Mode, RunConfig};
use dataset::Dataset;
use regression::FitOptions;

/// Metric used to order candidate fits; lower is better for all of them.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
pub enum TargetMetric {
    #[default]
    Rmse,
    Bic,
    Aicc,
}

impl TargetMetric {
    pub fn label(self) -> &'static str {
        match self {
            TargetMetric::Rmse => "RMSE",
            TargetMetric::Bic => "BIC",
            TargetMetric::Aicc => "AICc",
        }
    }
}

impl std::fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Evaluate(args) => RunConfig::from_evaluate_args(args),
        Commands::Compare(args) => RunConfig::from_compare_args(args),
        Commands::Scan(args) => RunConfig::from_scan_args(args),
    }
    .with_defaults();

    execute(&config)
}

fn execute(config: &RunConfig) -> Result<()> {
    config.validate()?;

    println!("--> Configuration\n{}", config.summary());

    if config.dry_run {
        println!("\nDry run requested: skipping model fitting.");
        return Ok(());
    }

    let data = Dataset::from_csv_path(&config.dataset, &config.missing)?;
    let body = build_report(config, &data)?;
    let report = Report::new(config.dataset.clone(), data.row_count(), body);

    match &config.output {
        Some(path) => {
            report.persist(path, config.format)?;
            println!("\nReport written to {}", path.display());
        }
        None => println!("\n--> Report\n{}", report.render(config.format)?),
    }

    Ok(())
}

fn build_report(config: &RunConfig, data: &Dataset) -> Result<ReportBody> {
    let eval = EvalOptions {
        loocv: config.loocv,
        kfold: config.kfold,
    };

    let body = match &config.mode {
        Mode::Evaluate { .. } => {
            let spec = config
                .model_spec()?
                .context("evaluate mode requires a model formula")?;
            let model = regression::fit(&spec, data, FitOptions::default())
                .with_context(|| format!("failed to fit {}", spec))?;
            let report = compare::evaluate_model(&model, eval)
                .with_context(|| format!("failed to evaluate {}", spec))?;
            ReportBody::Evaluation(ModelEvaluation::new(&model, report))
        }
        Mode::Compare { explanatory } => {
            let response = config
                .response
                .as_ref()
                .context("compare mode requires a response column")?;
            ReportBody::Ranking(compare::compare_transformations(
                response,
                explanatory,
                data,
                config.metric,
                eval,
            ))
        }
        Mode::Scan { include_response } => {
            let response = config
                .response
                .as_ref()
                .context("scan mode requires a response column")?;
            let options = ScanOptions {
                target: config.metric,
                eval,
                include_response: *include_response,
            };
            ReportBody::Plan(compare::scan_columns(response, data, &options))
        }
    };

    Ok(body)
}
