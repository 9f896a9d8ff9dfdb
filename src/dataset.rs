use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use csv::{ReaderBuilder, StringRecord};

pub const DEFAULT_MISSING_MARKERS: [&str; 2] = ["", "NA"];

/// Cell values for one column; `None` marks a missing observation.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Numeric(values) => values[row].is_none(),
            ColumnData::Categorical(values) => values[row].is_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Numeric column without missing values. `NaN` entries are stored as missing.
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| (!v.is_nan()).then_some(v))
            .collect();
        Self::new(name, ColumnData::Numeric(values))
    }

    pub fn categorical<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        let values = values.into_iter().map(|v| v.map(Into::into)).collect();
        Self::new(name, ColumnData::Categorical(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }
}

/// In-memory table of named, typed columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(|c| c.data.len()).unwrap_or(0);

        let mut seen = HashSet::new();
        for column in &columns {
            ensure!(
                seen.insert(column.name.as_str()),
                "column '{}' listed multiple times",
                column.name
            );
            ensure!(
                column.data.len() == rows,
                "column '{}' has {} rows, expected {}",
                column.name,
                column.data.len(),
                rows
            );
        }

        Ok(Self { columns, rows })
    }

    /// Load a CSV file with a header row.
    ///
    /// A column is numeric when every non-missing cell parses as `f64`;
    /// otherwise it is categorical.
    pub fn from_csv_path(path: &Path, missing_markers: &[String]) -> Result<Self> {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("failed to open dataset {}", path.display()))?;

        Self::from_csv(reader, missing_markers)
            .with_context(|| format!("failed to load dataset {}", path.display()))
    }

    pub fn from_reader<R: Read>(source: R, missing_markers: &[String]) -> Result<Self> {
        let reader = ReaderBuilder::new().has_headers(true).from_reader(source);
        Self::from_csv(reader, missing_markers)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>, missing_markers: &[String]) -> Result<Self> {
        let headers: Vec<String> = reader
            .headers()
            .context("unable to read CSV header")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for (row_idx, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("failed to parse CSV row {}", row_idx + 2))?;
            for (col_idx, column) in cells.iter_mut().enumerate() {
                column.push(read_cell(&record, col_idx, missing_markers));
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column::new(name, infer_column(raw)))
            .collect();

        Self::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }
}

fn read_cell(record: &StringRecord, index: usize, missing_markers: &[String]) -> Option<String> {
    let trimmed = record.get(index)?.trim();
    if missing_markers.iter().any(|m| m == trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn infer_column(raw: Vec<Option<String>>) -> ColumnData {
    let parsed: Option<Vec<Option<f64>>> = raw
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(text) => text
                .parse::<f64>()
                .ok()
                .map(|v| (!v.is_nan()).then_some(v)),
        })
        .collect();

    match parsed {
        Some(values) => ColumnData::Numeric(values),
        None => ColumnData::Categorical(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn markers() -> Vec<String> {
        DEFAULT_MISSING_MARKERS.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn infers_numeric_and_categorical_columns() {
        let csv = "price, area ,zone\n100,1.5,A\nNA,2.0,B\n250,,NA\n";
        let data = Dataset::from_reader(csv.as_bytes(), &markers()).expect("dataset");

        assert_eq!(data.row_count(), 3);
        assert_eq!(data.column_names(), vec!["price", "area", "zone"]);
        assert_eq!(
            data.column("price").unwrap().data(),
            &ColumnData::Numeric(vec![Some(100.0), None, Some(250.0)])
        );
        assert_eq!(
            data.column("area").unwrap().data(),
            &ColumnData::Numeric(vec![Some(1.5), Some(2.0), None])
        );
        assert_eq!(
            data.column("zone").unwrap().data(),
            &ColumnData::Categorical(vec![Some("A".into()), Some("B".into()), None])
        );
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "y,x\n1,2\n3,4").expect("write csv");

        let data = Dataset::from_csv_path(file.path(), &markers()).expect("dataset");
        assert_eq!(data.row_count(), 2);
        assert!(data.column("x").unwrap().is_numeric());
    }

    #[test]
    fn rejects_ragged_and_duplicate_columns() {
        let ragged = Dataset::new(vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::numeric("b", vec![1.0]),
        ]);
        assert!(ragged.unwrap_err().to_string().contains("has 1 rows"));

        let duplicate = Dataset::new(vec![
            Column::numeric("a", vec![1.0]),
            Column::numeric("a", vec![2.0]),
        ]);
        assert!(duplicate
            .unwrap_err()
            .to_string()
            .contains("listed multiple times"));
    }

    #[test]
    fn nan_is_stored_as_missing() {
        let column = Column::numeric("x", vec![1.0, f64::NAN]);
        assert!(column.data().is_missing(1));
        assert!(!column.data().is_missing(0));
    }

    #[test]
    fn nan_cells_load_as_missing_numeric_values() {
        let csv = "y,x\n1.5,2\nNaN,3\n2.5,nan\n";
        let data = Dataset::from_reader(csv.as_bytes(), &markers()).expect("dataset");

        assert_eq!(
            data.column("y").unwrap().data(),
            &ColumnData::Numeric(vec![Some(1.5), None, Some(2.5)])
        );
        assert_eq!(
            data.column("x").unwrap().data(),
            &ColumnData::Numeric(vec![Some(2.0), Some(3.0), None])
        );
    }
}
