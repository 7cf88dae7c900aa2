//! Misclassification report: which rows did the model get wrong, and what
//! do they look like in the source table.

use crate::dataset::Table;
use crate::error::Result;
use ndarray::Array1;
use std::fmt;

/// Positions predicted `positive` whose actual class is something else
pub fn false_positives(actual: &Array1<u32>, predicted: &Array1<u32>, positive: u32) -> Vec<usize> {
    actual
        .iter()
        .zip(predicted.iter())
        .enumerate()
        .filter(|(_, (a, p))| **p == positive && **a != positive)
        .map(|(pos, _)| pos)
        .collect()
}

/// Selected columns of selected table rows, printable as a plain table
#[derive(Debug, Clone, PartialEq)]
pub struct RowReport {
    pub title: String,
    pub columns: Vec<String>,
    /// Source row index followed by one value per column
    pub rows: Vec<(usize, Vec<String>)>,
}

impl RowReport {
    pub fn build(title: &str, table: &Table, row_ids: &[usize], columns: &[String]) -> Result<Self> {
        let values = columns
            .iter()
            .map(|name| table.string_column(name))
            .collect::<Result<Vec<_>>>()?;

        let rows = row_ids
            .iter()
            .map(|&row| {
                let cells = values.iter().map(|column| column[row].clone()).collect();
                (row, cells)
            })
            .collect();

        Ok(Self {
            title: title.to_string(),
            columns: columns.to_vec(),
            rows,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for RowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} ---", self.title)?;
        if self.rows.is_empty() {
            return writeln!(f, "(none)");
        }

        let index_width = self
            .rows
            .iter()
            .map(|(row, _)| row.to_string().len())
            .max()
            .unwrap_or(1);
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                self.rows
                    .iter()
                    .map(|(_, cells)| cells[i].len())
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:>w$}", "", w = index_width)?;
        for (name, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>w$}", name, w = *width)?;
        }
        writeln!(f)?;

        for (row, cells) in &self.rows {
            write!(f, "{:>w$}", row, w = index_width)?;
            for (cell, width) in cells.iter().zip(&widths) {
                write!(f, "  {:>w$}", cell, w = *width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
