use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::regression::Transform;
use crate::{OutputFormat, TargetMetric};

/// Command-line interface definition for ols-rank.
#[derive(Parser, Debug)]
#[command(
    name = "ols-rank",
    version,
    about = "Rank variable transformations and linear models by fit and predictive error"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit one model formula and report its scores and diagnostics.
    Evaluate(EvaluateArgs),
    /// Rank every transformation of one explanatory column.
    Compare(CompareArgs),
    /// Rank transformations of every column and keep the best three of each.
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Model formula, e.g. "log(price) ~ area + sqrt(lot) + zone".
    #[arg(short, long, value_name = "FORMULA")]
    pub formula: String,

    /// Also compute leave-one-out cross-validated MSE.
    #[arg(long)]
    pub loocv: bool,

    /// Also compute 10x repeated 10-fold cross-validated MSE.
    #[arg(long)]
    pub kfold: bool,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub response: ResponseArgs,

    /// Explanatory column whose transformations are compared.
    #[arg(short, long, value_name = "COLUMN")]
    pub explanatory: String,

    /// Also compute leave-one-out cross-validated MSE for every candidate.
    #[arg(long)]
    pub loocv: bool,

    /// Also compute 10x repeated 10-fold cross-validated MSE for every candidate.
    #[arg(long)]
    pub kfold: bool,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub response: ResponseArgs,

    /// Leave the response column out of the candidate columns.
    #[arg(long)]
    pub exclude_response: bool,
}

#[derive(Args, Debug)]
pub struct ResponseArgs {
    /// Response column to predict.
    #[arg(short, long, value_name = "COLUMN")]
    pub response: String,

    /// Transformation applied to the response before fitting.
    #[arg(long, value_enum, default_value = "identity")]
    pub response_transform: Transform,

    /// Metric used to rank candidates.
    #[arg(long, value_enum, default_value = "rmse")]
    pub metric: TargetMetric,
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to the CSV dataset.
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    /// Cell values treated as missing (repeatable). Defaults to "" and "NA".
    #[arg(long = "na", value_name = "MARKER")]
    pub missing: Vec<String>,

    /// Write the report to this location instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Preview configuration without fitting anything.
    #[arg(long)]
    pub dry_run: bool,
}
