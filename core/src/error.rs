//! Error types shared by the data, model and evaluation layers.

use polars::prelude::PolarsError;

/// Errors produced by `forestlog-core`
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to fetch dataset from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Dataset download from {url} returned HTTP {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("Failed to parse table: {0}")]
    Table(#[from] PolarsError),

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' has a missing value at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("Column '{column}' is not numeric ({dtype})")]
    NonNumeric { column: String, dtype: String },

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Model serialization failed: {0}")]
    Serialization(String),

    #[error("Image rendering failed: {0}")]
    Render(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid recipe: {0}")]
    Recipe(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
