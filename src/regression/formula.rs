use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element-wise transformation applied to a model variable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
pub enum Transform {
    #[default]
    #[value(name = "identity")]
    Identity,
    #[value(name = "log")]
    Ln,
    #[value(name = "log10")]
    Log10,
    #[value(name = "log2")]
    Log2,
    #[value(name = "exp")]
    Exp,
    #[value(name = "exp10")]
    Exp10,
    #[value(name = "exp2")]
    Exp2,
    #[value(name = "recip")]
    Reciprocal,
    #[value(name = "sq")]
    Square,
    #[value(name = "cube")]
    Cube,
    #[value(name = "sqrt")]
    Sqrt,
    #[value(name = "cbrt")]
    Cbrt,
}

impl Transform {
    /// The fixed candidate menu, in evaluation order.
    pub const MENU: [Transform; 12] = [
        Transform::Identity,
        Transform::Ln,
        Transform::Log10,
        Transform::Log2,
        Transform::Exp,
        Transform::Exp10,
        Transform::Exp2,
        Transform::Reciprocal,
        Transform::Square,
        Transform::Cube,
        Transform::Sqrt,
        Transform::Cbrt,
    ];

    /// Human-readable label used in ranking tables.
    pub fn label(self) -> &'static str {
        match self {
            Transform::Identity => "Linear",
            Transform::Ln => "Log",
            Transform::Log10 => "Log10",
            Transform::Log2 => "Log2",
            Transform::Exp => "Exponential",
            Transform::Exp10 => "Exp10",
            Transform::Exp2 => "Exp2",
            Transform::Reciprocal => "Reciprocal",
            Transform::Square => "Square",
            Transform::Cube => "Cube",
            Transform::Sqrt => "Square Root",
            Transform::Cbrt => "Cubic Root",
        }
    }

    /// Function name used in formula text; `None` for the identity.
    pub fn function_name(self) -> Option<&'static str> {
        match self {
            Transform::Identity => None,
            Transform::Ln => Some("log"),
            Transform::Log10 => Some("log10"),
            Transform::Log2 => Some("log2"),
            Transform::Exp => Some("exp"),
            Transform::Exp10 => Some("exp10"),
            Transform::Exp2 => Some("exp2"),
            Transform::Reciprocal => Some("recip"),
            Transform::Square => Some("sq"),
            Transform::Cube => Some("cube"),
            Transform::Sqrt => Some("sqrt"),
            Transform::Cbrt => Some("cbrt"),
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        Transform::MENU
            .into_iter()
            .find(|t| t.function_name() == Some(name))
    }

    /// Render the transformation of `variable` as formula text, e.g. `log(x)`.
    pub fn render(self, variable: &str) -> String {
        match self.function_name() {
            Some(name) => format!("{}({})", name, variable),
            None => variable.to_string(),
        }
    }

    /// Apply the transformation, returning `None` when `value` lies outside
    /// the domain or the result is not finite.
    ///
    /// Roots and logarithms require strictly positive input.
    pub fn apply(self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }

        let needs_positive = matches!(
            self,
            Transform::Ln | Transform::Log10 | Transform::Log2 | Transform::Sqrt | Transform::Cbrt
        );
        if needs_positive && value <= 0.0 {
            return None;
        }
        if self == Transform::Reciprocal && value == 0.0 {
            return None;
        }

        let out = match self {
            Transform::Identity => value,
            Transform::Ln => value.ln(),
            Transform::Log10 => value.log10(),
            Transform::Log2 => value.log2(),
            Transform::Exp => value.exp(),
            Transform::Exp10 => 10f64.powf(value),
            Transform::Exp2 => value.exp2(),
            Transform::Reciprocal => value.recip(),
            Transform::Square => value * value,
            Transform::Cube => value * value * value,
            Transform::Sqrt => value.sqrt(),
            Transform::Cbrt => value.cbrt(),
        };

        out.is_finite().then_some(out)
    }

    /// Map a value from transformed space back to original units.
    ///
    /// `Square` inverts to the principal (non-negative) root.
    pub fn inverse(self, value: f64) -> Option<f64> {
        let out = match self {
            Transform::Identity => value,
            Transform::Ln => value.exp(),
            Transform::Log10 => 10f64.powf(value),
            Transform::Log2 => value.exp2(),
            Transform::Exp => value.ln(),
            Transform::Exp10 => value.log10(),
            Transform::Exp2 => value.log2(),
            Transform::Reciprocal => value.recip(),
            Transform::Square => value.sqrt(),
            Transform::Cube => value.cbrt(),
            Transform::Sqrt => value * value,
            Transform::Cbrt => value * value * value,
        };

        out.is_finite().then_some(out)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A dataset column with a transformation applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    pub column: String,
    pub transform: Transform,
}

impl Term {
    pub fn new(column: impl Into<String>, transform: Transform) -> Self {
        Self {
            column: column.into(),
            transform,
        }
    }

    pub fn identity(column: impl Into<String>) -> Self {
        Self::new(column, Transform::Identity)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.transform.render(&self.column))
    }
}

impl FromStr for Term {
    type Err = FormulaError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(FormulaError::EmptyTerm);
        }

        let Some(open) = text.find('(') else {
            if text.contains(')') {
                return Err(FormulaError::Unbalanced(text.to_string()));
            }
            return Ok(Term::identity(text));
        };

        if !text.ends_with(')') || text[open + 1..].contains('(') {
            return Err(FormulaError::Unbalanced(text.to_string()));
        }

        let name = text[..open].trim();
        let inner = text[open + 1..text.len() - 1].trim();
        if inner.is_empty() || inner.contains(')') {
            return Err(FormulaError::Unbalanced(text.to_string()));
        }

        let transform = Transform::from_function_name(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

        Ok(Term::new(inner, transform))
    }
}

/// A linear model formula: a response term regressed on explanatory terms,
/// with an implicit intercept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub response: Term,
    pub terms: Vec<Term>,
}

impl ModelSpec {
    pub fn new(response: Term, terms: Vec<Term>) -> Self {
        Self { response, terms }
    }

    /// Names of every column the formula reads, response first.
    pub fn columns(&self) -> Vec<&str> {
        std::iter::once(self.response.column.as_str())
            .chain(self.terms.iter().map(|t| t.column.as_str()))
            .collect()
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rhs = self
            .terms
            .iter()
            .map(Term::to_string)
            .collect::<Vec<_>>()
            .join(" + ");
        write!(f, "{} ~ {}", self.response, rhs)
    }
}

impl FromStr for ModelSpec {
    type Err = FormulaError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (lhs, rhs) = raw.split_once('~').ok_or(FormulaError::MissingTilde)?;
        if rhs.contains('~') {
            return Err(FormulaError::MissingTilde);
        }

        if lhs.trim().is_empty() {
            return Err(FormulaError::EmptyResponse);
        }
        let response = lhs.parse::<Term>()?;

        let terms = rhs
            .split('+')
            .map(str::parse::<Term>)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ModelSpec::new(response, terms))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("formula must contain exactly one '~' separating response and terms")]
    MissingTilde,

    #[error("formula has no response before '~'")]
    EmptyResponse,

    #[error("formula contains an empty term")]
    EmptyTerm,

    #[error("unknown transformation function '{0}'")]
    UnknownFunction(String),

    #[error("unbalanced parentheses in term '{0}'")]
    Unbalanced(String),
}
