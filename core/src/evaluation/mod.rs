//! Model Evaluation
//!
//! Confusion matrices, classification metrics, the confusion-matrix image
//! and the misclassification report.

pub mod confusion;
pub mod metrics;
pub mod render;
pub mod report;

pub use confusion::ConfusionMatrix;
pub use metrics::{Average, ClassificationMetrics, MetricName};
pub use render::render_confusion_matrix;
pub use report::{false_positives, RowReport};
