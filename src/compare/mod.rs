//! Ranking of candidate transformations and model specifications.
//!
//! A single model is scored by [`evaluate_model`]; [`attempt`] and
//! [`fit_transformation`] fit one explanatory transformation and contain its
//! failure; [`compare_transformations`] ranks the full menu for one variable;
//! [`scan_columns`] repeats that across every column of a dataset.

mod attempt;
mod evaluate;
mod rank;
mod report;
mod scan;

pub use attempt::{attempt, fit_transformation, TransformCandidate};
pub use evaluate::{evaluate_model, EvalOptions, FitReport};
pub use rank::{
    compare_transformations, rank_reports, RankingTable, PREFERRED_TRANSFORMS, TIE_TOLERANCE,
};
pub use report::{ModelEvaluation, Report, ReportBody};
pub use scan::{scan_columns, ScanEntry, ScanOptions, TransformationPlan, TOP_PER_COLUMN};
