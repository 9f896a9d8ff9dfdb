use serde::Serialize;
use tracing::{debug, info};

use super::evaluate::{EvalOptions, FitReport};
use super::rank::compare_transformations;
use crate::dataset::Dataset;
use crate::regression::Term;
use crate::TargetMetric;

/// Ranked transformations kept per column.
pub const TOP_PER_COLUMN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanOptions {
    pub target: TargetMetric,
    pub eval: EvalOptions,
    /// Also scan the response column as a candidate against itself.
    pub include_response: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            target: TargetMetric::Rmse,
            eval: EvalOptions::default(),
            include_response: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEntry {
    pub variable: String,
    pub report: FitReport,
}

/// Best transformations for every column of a dataset against one response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationPlan {
    pub response: String,
    pub target: TargetMetric,
    /// Top rows of every column, sorted by (RMSE, AICc).
    pub entries: Vec<ScanEntry>,
    /// Each column's first-ranked transformation, in column order.
    pub recommendations: Vec<(String, String)>,
}

impl TransformationPlan {
    pub fn entries_for<'a>(
        &'a self,
        variable: &'a str,
    ) -> impl Iterator<Item = &'a ScanEntry> + 'a {
        self.entries.iter().filter(move |e| e.variable == variable)
    }

    pub fn recommendation(&self, variable: &str) -> Option<&str> {
        self.recommendations
            .iter()
            .find(|(v, _)| v == variable)
            .map(|(_, label)| label.as_str())
    }
}

/// Rank transformations of every column against `response`, keeping the top
/// [`TOP_PER_COLUMN`] of each.
pub fn scan_columns(response: &Term, data: &Dataset, options: &ScanOptions) -> TransformationPlan {
    let candidates: Vec<&str> = data
        .column_names()
        .into_iter()
        .filter(|name| options.include_response || *name != response.column)
        .collect();

    info!(
        response = %response,
        columns = candidates.len(),
        target = %options.target,
        "scanning columns for the best transformation"
    );

    let mut entries = Vec::new();
    let mut recommendations = Vec::new();

    for variable in candidates {
        let ranking =
            compare_transformations(response, variable, data, options.target, options.eval);
        debug!(
            variable,
            kept = ranking.rows.len().min(TOP_PER_COLUMN),
            "column ranked"
        );

        if let Some(best) = ranking.best() {
            recommendations.push((variable.to_string(), best.label.clone()));
        }

        entries.extend(
            ranking
                .rows
                .into_iter()
                .take(TOP_PER_COLUMN)
                .map(|report| ScanEntry {
                    variable: variable.to_string(),
                    report,
                }),
        );
    }

    let key = |e: &ScanEntry| {
        (
            e.report.rmse.unwrap_or(f64::INFINITY),
            e.report.aicc.unwrap_or(f64::INFINITY),
        )
    };
    entries.sort_by(|a, b| {
        let (a_rmse, a_aicc) = key(a);
        let (b_rmse, b_aicc) = key(b);
        a_rmse.total_cmp(&b_rmse).then(a_aicc.total_cmp(&b_aicc))
    });

    TransformationPlan {
        response: response.to_string(),
        target: options.target,
        entries,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn data() -> Dataset {
        let x: Vec<f64> = (1..=20).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 0.4 * v + 0.2 * (v * 2.3).cos()).collect();
        let zone: Vec<Option<&str>> = (0..20)
            .map(|i| Some(if i % 2 == 0 { "A" } else { "B" }))
            .collect();
        Dataset::new(vec![
            Column::numeric("y", y),
            Column::numeric("x", x),
            Column::categorical("zone", zone),
        ])
        .unwrap()
    }

    #[test]
    fn keeps_at_most_three_rows_per_column_and_sorts_globally() {
        let plan = scan_columns(&Term::identity("y"), &data(), &ScanOptions::default());

        assert_eq!(plan.entries_for("y").count(), 3);
        assert_eq!(plan.entries_for("x").count(), 3);
        // A categorical column only admits the untransformed fit.
        assert_eq!(plan.entries_for("zone").count(), 1);
        assert_eq!(plan.recommendation("zone"), Some("Linear"));

        let rmses: Vec<f64> = plan.entries.iter().map(|e| e.report.rmse.unwrap()).collect();
        assert!(rmses.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(plan.entries[0].variable, "y");
    }

    #[test]
    fn response_column_can_be_excluded() {
        let options = ScanOptions {
            include_response: false,
            ..ScanOptions::default()
        };
        let plan = scan_columns(&Term::identity("y"), &data(), &options);

        assert_eq!(plan.entries_for("y").count(), 0);
        assert_eq!(plan.recommendation("y"), None);
        assert_eq!(plan.entries.len(), 4);
    }
}
