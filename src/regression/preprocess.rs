use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};

use super::error::{FitError, FitResult};
use super::formula::{ModelSpec, Term, Transform};
use crate::dataset::{Column, ColumnData, Dataset};

/// Numeric inputs for one fit, restricted to complete cases.
#[derive(Debug, Clone)]
pub(crate) struct Design {
    pub matrix: DMatrix<f64>,
    pub labels: Vec<String>,
    /// Response in model (transformed) space.
    pub response: DVector<f64>,
    /// Response in original units.
    pub raw_response: DVector<f64>,
}

enum Encoded {
    Numeric(Vec<f64>),
    Dummies { labels: Vec<String>, columns: Vec<Vec<f64>> },
}

pub(crate) fn build_design(spec: &ModelSpec, data: &Dataset) -> FitResult<Design> {
    let response_column = lookup(data, &spec.response.column)?;
    let ColumnData::Numeric(response_values) = response_column.data() else {
        return Err(FitError::NonNumericResponse(spec.response.column.clone()));
    };

    let term_columns = spec
        .terms
        .iter()
        .map(|term| lookup(data, &term.column))
        .collect::<FitResult<Vec<_>>>()?;

    let rows: Vec<usize> = (0..data.row_count())
        .filter(|&row| {
            response_values[row].is_some()
                && term_columns.iter().all(|c| !c.data().is_missing(row))
        })
        .collect();

    let raw_response: Vec<f64> = rows
        .iter()
        .map(|&row| response_values[row].unwrap_or(f64::NAN))
        .collect();
    let response = transform_values(&spec.response, &raw_response)?;

    let mut labels = vec!["(Intercept)".to_string()];
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for (term, column) in spec.terms.iter().zip(&term_columns) {
        match encode_term(term, column, &rows)? {
            Encoded::Numeric(values) => {
                labels.push(term.to_string());
                columns.push(values);
            }
            Encoded::Dummies {
                labels: dummy_labels,
                columns: dummy_columns,
            } => {
                labels.extend(dummy_labels);
                columns.extend(dummy_columns);
            }
        }
    }

    let n = rows.len();
    let p = labels.len();
    if n <= p {
        return Err(FitError::InsufficientData { rows: n, cols: p });
    }

    let mut buffer = Vec::with_capacity(n * p);
    for i in 0..n {
        buffer.push(1.0); // intercept
        buffer.extend(columns.iter().map(|c| c[i]));
    }

    Ok(Design {
        matrix: DMatrix::from_row_slice(n, p, &buffer),
        labels,
        response: DVector::from_vec(response),
        raw_response: DVector::from_vec(raw_response),
    })
}

fn lookup<'a>(data: &'a Dataset, name: &str) -> FitResult<&'a Column> {
    data.column(name)
        .ok_or_else(|| FitError::UnknownColumn(name.to_string()))
}

fn transform_values(term: &Term, values: &[f64]) -> FitResult<Vec<f64>> {
    values
        .iter()
        .map(|&value| {
            term.transform.apply(value).ok_or_else(|| FitError::Domain {
                expression: term.to_string(),
                value,
            })
        })
        .collect()
}

fn encode_term(term: &Term, column: &Column, rows: &[usize]) -> FitResult<Encoded> {
    match column.data() {
        ColumnData::Numeric(values) => {
            let picked: Vec<f64> = rows
                .iter()
                .map(|&row| values[row].unwrap_or(f64::NAN))
                .collect();
            transform_values(term, &picked).map(Encoded::Numeric)
        }
        ColumnData::Categorical(values) => {
            if term.transform != Transform::Identity {
                return Err(FitError::NonNumericTransform {
                    column: term.column.clone(),
                    transform: term.transform.label().to_string(),
                });
            }

            let picked: Vec<&str> = rows
                .iter()
                .map(|&row| values[row].as_deref().unwrap_or_default())
                .collect();

            // Treatment coding: sorted levels, first level is the baseline.
            let levels: BTreeSet<&str> = picked.iter().copied().collect();
            if levels.len() < 2 {
                return Err(FitError::SingleLevel(term.column.clone()));
            }

            let (labels, columns) = levels
                .into_iter()
                .skip(1)
                .map(|level| {
                    let indicator = picked
                        .iter()
                        .map(|&v| if v == level { 1.0 } else { 0.0 })
                        .collect();
                    (format!("{}[{}]", term.column, level), indicator)
                })
                .unzip();

            Ok(Encoded::Dummies { labels, columns })
        }
    }
}
