use serde::Serialize;

use super::attempt::{fit_transformation, TransformCandidate};
use super::evaluate::{EvalOptions, FitReport};
use crate::dataset::Dataset;
use crate::regression::{Term, Transform};
use crate::TargetMetric;

/// Scores this close to the best count as a tie.
pub const TIE_TOLERANCE: f64 = 1e-4;

/// Tie-break preference, most preferred first.
pub const PREFERRED_TRANSFORMS: [Transform; 3] =
    [Transform::Exp, Transform::Ln, Transform::Identity];

/// Transformations of one explanatory variable, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingTable {
    pub response: String,
    pub variable: String,
    pub target: TargetMetric,
    pub rows: Vec<FitReport>,
}

impl RankingTable {
    pub fn best(&self) -> Option<&FitReport> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fit every transformation in [`Transform::MENU`] of `explanatory` against
/// `response` and rank the ones that succeed by `target`.
pub fn compare_transformations(
    response: &Term,
    explanatory: &str,
    data: &Dataset,
    target: TargetMetric,
    options: EvalOptions,
) -> RankingTable {
    let reports = Transform::MENU
        .into_iter()
        .map(|transform| {
            let candidate = TransformCandidate::new(response.clone(), explanatory, transform);
            fit_transformation(&candidate, data, options)
        })
        .collect();

    RankingTable {
        response: response.to_string(),
        variable: explanatory.to_string(),
        target,
        rows: rank_reports(reports, target, options),
    }
}

/// Drop incomplete rows, sort ascending by `target`, then promote the most
/// preferred transformation that ties with the leader.
pub fn rank_reports(
    reports: Vec<FitReport>,
    target: TargetMetric,
    options: EvalOptions,
) -> Vec<FitReport> {
    let mut rows: Vec<FitReport> = reports
        .into_iter()
        .filter(|r| r.is_complete(options) && r.metric(target).is_some())
        .collect();

    let score = |r: &FitReport| r.metric(target).unwrap_or(f64::INFINITY);
    rows.sort_by(|a, b| score(a).total_cmp(&score(b)));

    let Some(best) = rows.first().map(score) else {
        return rows;
    };

    for preferred in PREFERRED_TRANSFORMS {
        let position = rows.iter().position(|r| r.label == preferred.label());
        if let Some(idx) = position {
            if ties(score(&rows[idx]), best) {
                let promoted = rows.remove(idx);
                rows.insert(0, promoted);
                break;
            }
        }
    }

    rows
}

fn ties(candidate: f64, best: f64) -> bool {
    // Perfect fits score -inf, where the difference is NaN.
    candidate == best || (candidate - best).abs() <= TIE_TOLERANCE
}
