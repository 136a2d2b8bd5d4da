use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// A single cell, as read from or written to a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Homogeneous column storage
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Integer(Vec<i64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Integer(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer and float columns are both numeric
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Column::Text(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Integer(_) => "integer",
            Column::Text(_) => "text",
        }
    }

    /// Widen a numeric column to f64, `None` for text
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            Column::Float(v) => Some(v.clone()),
            Column::Integer(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::Text(_) => None,
        }
    }

    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            Column::Float(v) => v.get(row).map(|&x| Value::Float(x)),
            Column::Integer(v) => v.get(row).map(|&x| Value::Integer(x)),
            Column::Text(v) => v.get(row).map(|s| Value::Text(s.clone())),
        }
    }

    /// Gather the given rows, in the given order
    pub fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Float(v) => Column::Float(rows.iter().map(|&r| v[r]).collect()),
            Column::Integer(v) => Column::Integer(rows.iter().map(|&r| v[r]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }

    /// Build a column from cells. All integers stay integer, any mix of
    /// integers and floats widens to float, text cannot mix with numbers.
    pub fn from_values(name: &str, values: Vec<Value>) -> Result<Column> {
        let all_int = values.iter().all(|v| matches!(v, Value::Integer(_)));
        let all_text = values.iter().all(|v| matches!(v, Value::Text(_)));

        if all_int {
            return Ok(Column::Integer(
                values
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Integer(x) => Some(x),
                        _ => None,
                    })
                    .collect(),
            ));
        }

        if all_text && !values.is_empty() {
            return Ok(Column::Text(
                values
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Text(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ));
        }

        let mut out = Vec::with_capacity(values.len());
        for v in &values {
            match v.as_f64() {
                Some(x) => out.push(x),
                None => {
                    return Err(EngineError::invalid(format!(
                        "column '{}' mixes text and numeric values",
                        name
                    )))
                }
            }
        }
        Ok(Column::Float(out))
    }
}
