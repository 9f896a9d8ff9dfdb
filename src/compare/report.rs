use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::evaluate::FitReport;
use super::rank::RankingTable;
use super::scan::TransformationPlan;
use crate::regression::{InfluenceDiagnostics, LinearModel, ResidualSummary};
use crate::OutputFormat;

/// A single model's scores plus its coefficients and residual diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ModelEvaluation {
    pub report: FitReport,
    pub observations: usize,
    pub r_squared: f64,
    pub coefficients: Vec<(String, f64)>,
    pub residuals: ResidualSummary,
    pub influence: Option<InfluenceDiagnostics>,
}

impl ModelEvaluation {
    pub fn new(model: &LinearModel, report: FitReport) -> Self {
        Self {
            report,
            observations: model.observations(),
            r_squared: model.metrics().r2,
            coefficients: model
                .coefficients()
                .into_iter()
                .map(|(label, value)| (label.to_string(), value))
                .collect(),
            residuals: model.residual_summary(),
            influence: model.influence(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportBody {
    Evaluation(ModelEvaluation),
    Ranking(RankingTable),
    Plan(TransformationPlan),
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub(crate) dataset: PathBuf,
    pub(crate) rows: usize,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) body: ReportBody,
}

impl Report {
    pub fn new(dataset: PathBuf, rows: usize, body: ReportBody) -> Self {
        Self {
            dataset,
            rows,
            timestamp: Utc::now(),
            body,
        }
    }

    pub fn body(&self) -> &ReportBody {
        &self.body
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).context("failed to serialize report")
            }
        }
    }

    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Dataset: {}", self.dataset.display()));
        lines.push(format!("Rows: {}", self.rows));
        lines.push(format!(
            "Generated at: {}",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));
        lines.push(String::new());

        match &self.body {
            ReportBody::Evaluation(evaluation) => render_evaluation(&mut lines, evaluation),
            ReportBody::Ranking(table) => render_ranking(&mut lines, table),
            ReportBody::Plan(plan) => render_plan(&mut lines, plan),
        }

        lines.join("\n")
    }

    pub fn persist(&self, path: &Path, format: OutputFormat) -> Result<()> {
        fs::write(path, self.render(format)?)
            .with_context(|| format!("failed to write report to {}", path.display()))
    }
}

fn render_evaluation(lines: &mut Vec<String>, evaluation: &ModelEvaluation) {
    let report = &evaluation.report;
    lines.push(format!(
        "Model: {}",
        report.model.as_deref().unwrap_or(&report.label)
    ));
    lines.push(format!("Observations used: {}", evaluation.observations));

    lines.push(String::new());
    lines.push("Metrics:".to_string());
    lines.push(format!("  Terms: {}", fmt_count(report.terms)));
    lines.push(format!("  R^2: {:.6}", evaluation.r_squared));
    lines.push(format!("  Adjusted R^2: {}", fmt_metric(report.adj_r_squared)));
    lines.push(format!("  BIC: {}", fmt_metric(report.bic)));
    lines.push(format!("  AICc: {}", fmt_metric(report.aicc)));
    lines.push(format!("  RMSE (original units): {}", fmt_metric(report.rmse)));
    if let Some(loocv) = report.loocv_mse {
        lines.push(format!("  LOOCV MSE: {:.6}", loocv));
    }
    if let Some(kfold) = &report.kfold {
        lines.push(format!(
            "  {}-fold CV MSE ({} runs): {:.6} (95% half-width {:.6})",
            kfold.folds,
            kfold.runs.len(),
            kfold.mean_mse,
            kfold.half_width_95()
        ));
    }

    lines.push(String::new());
    lines.push("Coefficients:".to_string());
    for (name, value) in &evaluation.coefficients {
        lines.push(format!("  {:<20} {:>14.6}", name, value));
    }

    let residuals = &evaluation.residuals;
    lines.push(String::new());
    lines.push("Residuals:".to_string());
    lines.push(format!(
        "  mean={:.6} sd={:.6} min={:.6} max={:.6} max|r|={:.6}",
        residuals.mean, residuals.std_dev, residuals.min, residuals.max, residuals.max_abs
    ));

    if let Some(influence) = &evaluation.influence {
        lines.push(String::new());
        lines.push(format!(
            "Leverage (threshold {:.4}):",
            influence.leverage_threshold
        ));
        for (row, value) in &influence.leverage {
            lines.push(format!("  row {:<6} {:.6}", row, value));
        }
        lines.push(format!(
            "Cook's distance (threshold {:.4}):",
            influence.cooks_threshold
        ));
        for (row, value) in &influence.cooks_distance {
            lines.push(format!("  row {:<6} {:.6}", row, value));
        }
    }
}

fn render_ranking(lines: &mut Vec<String>, table: &RankingTable) {
    lines.push(format!(
        "Transformations of '{}' for {} (ranked by {}):",
        table.variable, table.response, table.target
    ));
    if table.rows.is_empty() {
        lines.push("  no transformation could be fit".to_string());
        return;
    }

    lines.push(table_header(None));
    for row in &table.rows {
        lines.push(table_row(None, row));
    }
}

fn render_plan(lines: &mut Vec<String>, plan: &TransformationPlan) {
    lines.push(format!(
        "Best transformations per column for {} (ranked by {}):",
        plan.response, plan.target
    ));
    if plan.entries.is_empty() {
        lines.push("  no column could be fit".to_string());
        return;
    }

    lines.push(table_header(Some("Variable")));
    for entry in &plan.entries {
        lines.push(table_row(Some(&entry.variable), &entry.report));
    }

    lines.push(String::new());
    lines.push("Recommended:".to_string());
    for (variable, label) in &plan.recommendations {
        lines.push(format!("  {:<20} {}", variable, label));
    }
}

fn table_header(first: Option<&str>) -> String {
    let prefix = first.map(|f| format!("{:<20} ", f)).unwrap_or_default();
    format!(
        "  {}{:<12} {:>5} {:>10} {:>12} {:>12} {:>12} {:>12} {:>12}",
        prefix, "Transform", "Terms", "AdjR2", "BIC", "AICc", "RMSE", "LOOCV", "KFold"
    )
}

fn table_row(first: Option<&str>, row: &FitReport) -> String {
    let prefix = first.map(|f| format!("{:<20} ", f)).unwrap_or_default();
    format!(
        "  {}{:<12} {:>5} {:>10} {:>12} {:>12} {:>12} {:>12} {:>12}",
        prefix,
        row.label,
        fmt_count(row.terms),
        fmt_metric(row.adj_r_squared),
        fmt_metric(row.bic),
        fmt_metric(row.aicc),
        fmt_metric(row.rmse),
        fmt_metric(row.loocv_mse),
        fmt_metric(row.kfold_mse()),
    )
}

fn fmt_metric(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "NA".to_string())
}

fn fmt_count(value: Option<usize>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "NA".to_string())
}
