//! Confusion matrix: rows are actual classes, columns are predicted classes.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(y_true: &Array1<u32>, y_pred: &Array1<u32>, n_classes: usize) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(Error::InvalidInput(format!(
                "Actual and predicted labels differ in length: {} vs {}",
                y_true.len(),
                y_pred.len()
            )));
        }

        let mut counts = Array2::<usize>::zeros((n_classes, n_classes));
        for (&actual, &predicted) in y_true.iter().zip(y_pred.iter()) {
            let (actual, predicted) = (actual as usize, predicted as usize);
            if actual >= n_classes || predicted >= n_classes {
                return Err(Error::InvalidInput(format!(
                    "Class index out of range for {} classes: actual={}, predicted={}",
                    n_classes, actual, predicted
                )));
            }
            counts[[actual, predicted]] += 1;
        }

        Ok(Self { counts })
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.counts[[actual, predicted]]
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Samples on the diagonal
    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Samples whose actual class is `class` (its support)
    pub fn actual_total(&self, class: usize) -> usize {
        self.counts.index_axis(Axis(0), class).sum()
    }

    pub fn predicted_total(&self, class: usize) -> usize {
        self.counts.index_axis(Axis(1), class).sum()
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}
