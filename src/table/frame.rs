use super::{Column, Matrix, Value};
use crate::error::{EngineError, Result};
use indexmap::IndexMap;

/// One row as an ordered column -> value map
pub type Record = IndexMap<String, Value>;

/// Column-oriented table of songs
///
/// Column names are unique and keep insertion order. Every column holds
/// exactly `n_rows` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, column) in columns {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    /// Build a table from row records
    ///
    /// Column order is the order in which names first appear. Every record
    /// must carry every column.
    pub fn from_records(records: &[Record]) -> Result<Self> {
        let mut names: Vec<&String> = Vec::new();
        for record in records {
            for name in record.keys() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let mut table = Self::new();
        table.n_rows = records.len();
        for name in names {
            let mut cells = Vec::with_capacity(records.len());
            for (i, record) in records.iter().enumerate() {
                let cell = record.get(name).ok_or_else(|| {
                    EngineError::invalid(format!("row {} has no value for '{}'", i, name))
                })?;
                cells.push(cell.clone());
            }
            table.push_column(name.clone(), Column::from_values(name, cells)?)?;
        }
        Ok(table)
    }

    pub fn record(&self, row: usize) -> Record {
        self.names
            .iter()
            .zip(&self.columns)
            .filter_map(|(name, col)| col.get(row).map(|v| (name.clone(), v)))
            .collect()
    }

    pub fn to_records(&self) -> Vec<Record> {
        (0..self.n_rows).map(|r| self.record(r)).collect()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(|n| n.as_str()).zip(&self.columns)
    }

    /// Numeric column widened to f64
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name).ok_or_else(|| EngineError::missing(name))?;
        column.to_f64().ok_or_else(|| {
            EngineError::invalid(format!("column '{}' is {}, not numeric", name, column.kind()))
        })
    }

    /// Requested names this table does not have, in request order
    pub fn missing_features<'a>(&self, features: &'a [String]) -> Vec<&'a str> {
        features
            .iter()
            .filter(|f| !self.has_column(f))
            .map(|f| f.as_str())
            .collect()
    }

    pub fn contains_all(&self, features: &[String]) -> bool {
        features.iter().all(|f| self.has_column(f))
    }

    /// Project onto `features`, in that order
    pub fn select(&self, features: &[String]) -> Result<Self> {
        let mut out = Self {
            n_rows: self.n_rows,
            ..Self::default()
        };
        for name in features {
            let column = self
                .column(name)
                .ok_or_else(|| EngineError::missing(name.as_str()))?;
            out.push_column(name.clone(), column.clone())?;
        }
        Ok(out)
    }

    /// Rename columns per `mapper`. Returns the renamed table and the
    /// mapper keys that matched no column.
    pub fn rename(&self, mapper: &IndexMap<String, String>) -> Result<(Self, Vec<String>)> {
        let unused: Vec<String> = mapper
            .keys()
            .filter(|k| !self.has_column(k))
            .cloned()
            .collect();

        let mut out = Self {
            n_rows: self.n_rows,
            ..Self::default()
        };
        for (name, column) in self.names.iter().zip(&self.columns) {
            let new_name = mapper.get(name).unwrap_or(name);
            out.push_column(new_name.clone(), column.clone())?;
        }
        Ok((out, unused))
    }

    pub fn numeric_subset(&self) -> Self {
        self.filter_columns(|c| c.is_numeric())
    }

    pub fn non_numeric_subset(&self) -> Self {
        self.filter_columns(|c| !c.is_numeric())
    }

    fn filter_columns(&self, keep: impl Fn(&Column) -> bool) -> Self {
        let (names, columns) = self
            .names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| keep(c))
            .map(|(n, c)| (n.clone(), c.clone()))
            .unzip();
        Self {
            names,
            columns,
            n_rows: self.n_rows,
        }
    }

    /// Append a column. The first column of an empty table fixes the row count.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(EngineError::invalid(format!("duplicate column '{}'", name)));
        }
        if self.names.is_empty() && self.n_rows == 0 {
            self.n_rows = column.len();
        } else if column.len() != self.n_rows {
            return Err(EngineError::invalid(format!(
                "column '{}' has {} rows, table has {}",
                name,
                column.len(),
                self.n_rows
            )));
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn without_column(&self, name: &str) -> Self {
        let (names, columns) = self
            .names
            .iter()
            .zip(&self.columns)
            .filter(|(n, _)| n.as_str() != name)
            .map(|(n, c)| (n.clone(), c.clone()))
            .unzip();
        Self {
            names,
            columns,
            n_rows: self.n_rows,
        }
    }

    /// Gather rows by index, in the given order
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            n_rows: rows.len(),
        }
    }

    /// Row-major matrix over `features`. Missing or text columns fail.
    pub fn matrix(&self, features: &[String]) -> Result<Matrix> {
        let columns = features
            .iter()
            .map(|f| self.numeric_column(f))
            .collect::<Result<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(EngineError::invalid("no features selected"));
        }
        Matrix::from_columns(&columns)
    }
}
