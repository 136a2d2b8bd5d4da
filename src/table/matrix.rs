use crate::error::{EngineError, Result};

/// Dense row-major matrix of f64
///
/// Distance kernels take row slices out of one contiguous buffer instead of
/// chasing a `Vec<Vec<f64>>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl Matrix {
    /// Interleave equally sized columns into row-major storage
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self> {
        let n_cols = columns.len();
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        if columns.iter().any(|c| c.len() != n_rows) {
            return Err(EngineError::invalid("columns have different lengths"));
        }

        let mut data = Vec::with_capacity(n_rows * n_cols);
        for r in 0..n_rows {
            for col in columns {
                data.push(col[r]);
            }
        }

        Ok(Self {
            data,
            n_rows,
            n_cols,
        })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != n_cols) {
            return Err(EngineError::invalid("rows have different lengths"));
        }

        Ok(Self {
            data: rows.iter().flatten().copied().collect(),
            n_rows,
            n_cols,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Mean of the per-column population variances
    pub fn mean_variance(&self) -> f64 {
        if self.n_rows == 0 || self.n_cols == 0 {
            return 0.0;
        }
        let n = self.n_rows as f64;
        let mut total = 0.0;
        for c in 0..self.n_cols {
            let mean = self.rows().map(|r| r[c]).sum::<f64>() / n;
            total += self.rows().map(|r| (r[c] - mean).powi(2)).sum::<f64>() / n;
        }
        total / self.n_cols as f64
    }
}
