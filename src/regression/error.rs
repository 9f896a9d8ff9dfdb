use thiserror::Error;

/// Reasons a single model fit can fail.
///
/// These never abort a comparison: the comparator turns each one into a row
/// with missing metrics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("column '{0}' not found in dataset")]
    UnknownColumn(String),

    #[error("response column '{0}' must be numeric")]
    NonNumericResponse(String),

    #[error("cannot apply {transform} to categorical column '{column}'")]
    NonNumericTransform { column: String, transform: String },

    #[error("{expression} is undefined for value {value}")]
    Domain { expression: String, value: f64 },

    #[error("categorical column '{0}' has fewer than two levels")]
    SingleLevel(String),

    #[error("insufficient data: {rows} rows for {cols} design columns (need rows > columns)")]
    InsufficientData { rows: usize, cols: usize },

    #[error("design matrix is singular or near-singular; columns may be collinear")]
    Singular,

    #[error("cannot split {rows} rows into {folds} folds")]
    InvalidFolds { folds: usize, rows: usize },

    #[error("{0} is not finite")]
    NonFiniteMetric(&'static str),
}

pub type FitResult<T> = Result<T, FitError>;
