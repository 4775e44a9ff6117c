//! Mean imputation
//!
//! Column means are learned from the rows passed to [`MeanImputer::fit`] (the
//! training split) and applied to any later rows, so held-out rows never
//! influence the statistics.

use crate::error::AnalysisError;

/// Per-column mean imputer
#[derive(Debug, Clone)]
pub struct MeanImputer {
    means: Vec<f64>,
}

impl MeanImputer {
    /// Learn the mean of every column, ignoring missing cells.
    ///
    /// A column with no observed value imputes to 0.0, which leaves it
    /// constant and therefore unused by the model.
    pub fn fit(rows: &[Vec<Option<f64>>], n_columns: usize) -> Self {
        let mut sums = vec![0.0; n_columns];
        let mut counts = vec![0usize; n_columns];

        for row in rows {
            for (col, cell) in row.iter().enumerate().take(n_columns) {
                if let Some(v) = cell {
                    sums[col] += v;
                    counts[col] += 1;
                }
            }
        }

        let means = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
            .collect();

        Self { means }
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Replace missing cells with the learned means
    pub fn transform(&self, rows: &[Vec<Option<f64>>]) -> Result<Vec<Vec<f64>>, AnalysisError> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    pub fn transform_row(&self, row: &[Option<f64>]) -> Result<Vec<f64>, AnalysisError> {
        if row.len() != self.means.len() {
            return Err(AnalysisError::MalformedInput(format!(
                "row has {} columns, imputer was fit on {}",
                row.len(),
                self.means.len()
            )));
        }
        Ok(row
            .iter()
            .zip(&self.means)
            .map(|(cell, mean)| cell.unwrap_or(*mean))
            .collect())
    }
}

/// Mean of the known values of a single column
pub fn column_mean(values: &[Option<f64>]) -> Option<f64> {
    let known: Vec<f64> = values.iter().flatten().copied().collect();
    if known.is_empty() {
        None
    } else {
        Some(known.iter().sum::<f64>() / known.len() as f64)
    }
}
