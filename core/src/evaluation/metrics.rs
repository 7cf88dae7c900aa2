//! Classification Metrics
//!
//! Accuracy, precision, recall and F1 computed from a confusion matrix.
//! Per-class scores with an empty denominator count as 0.0.

use crate::evaluation::confusion::ConfusionMatrix;
use crate::error::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How per-class precision/recall are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Average {
    /// Scores of the positive class only
    Binary { positive: u32 },
    /// Per-class scores weighted by support
    Weighted,
    /// Unweighted mean of per-class scores
    Macro,
}

impl Default for Average {
    fn default() -> Self {
        Average::Binary { positive: 1 }
    }
}

/// Metric keys recorded on a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Accuracy,
    Precision,
    Recall,
    F1,
}

impl MetricName {
    pub fn key(&self) -> &'static str {
        match self {
            MetricName::Accuracy => "accuracy",
            MetricName::Precision => "precision",
            MetricName::Recall => "recall",
            MetricName::F1 => "f1_score",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ClassificationMetrics {
    pub fn compute(
        y_true: &Array1<u32>,
        y_pred: &Array1<u32>,
        n_classes: usize,
        average: Average,
    ) -> Result<Self> {
        let matrix = ConfusionMatrix::new(y_true, y_pred, n_classes)?;
        Self::from_confusion(&matrix, average)
    }

    pub fn from_confusion(matrix: &ConfusionMatrix, average: Average) -> Result<Self> {
        let total = matrix.total();
        if total == 0 {
            return Err(Error::InvalidInput(
                "Cannot score an empty prediction set".to_string(),
            ));
        }
        let accuracy = matrix.correct() as f64 / total as f64;

        let per_class: Vec<ClassScore> = (0..matrix.n_classes())
            .map(|class| ClassScore::of(matrix, class))
            .collect();

        let (precision, recall, f1) = match average {
            Average::Binary { positive } => {
                let score = per_class.get(positive as usize).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "Positive class {} not among {} classes",
                        positive,
                        per_class.len()
                    ))
                })?;
                (score.precision, score.recall, score.f1)
            }
            Average::Weighted => {
                let weighted = |f: fn(&ClassScore) -> f64| {
                    per_class
                        .iter()
                        .map(|s| f(s) * s.support as f64)
                        .sum::<f64>()
                        / total as f64
                };
                (
                    weighted(|s| s.precision),
                    weighted(|s| s.recall),
                    weighted(|s| s.f1),
                )
            }
            Average::Macro => {
                let n = per_class.len().max(1) as f64;
                let mean = |f: fn(&ClassScore) -> f64| per_class.iter().map(f).sum::<f64>() / n;
                (mean(|s| s.precision), mean(|s| s.recall), mean(|s| s.f1))
            }
        };

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1,
        })
    }

    pub fn get(&self, name: MetricName) -> f64 {
        match name {
            MetricName::Accuracy => self.accuracy,
            MetricName::Precision => self.precision,
            MetricName::Recall => self.recall,
            MetricName::F1 => self.f1,
        }
    }

    /// `(key, value)` pairs for the requested metrics
    pub fn select(&self, names: &[MetricName]) -> Vec<(String, f64)> {
        names
            .iter()
            .map(|name| (name.key().to_string(), self.get(*name)))
            .collect()
    }
}

struct ClassScore {
    precision: f64,
    recall: f64,
    f1: f64,
    support: usize,
}

impl ClassScore {
    fn of(matrix: &ConfusionMatrix, class: usize) -> Self {
        let true_positives = matrix.get(class, class) as f64;
        let predicted = matrix.predicted_total(class);
        let support = matrix.actual_total(class);

        let precision = ratio(true_positives, predicted);
        let recall = ratio(true_positives, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1,
            support,
        }
    }
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}
