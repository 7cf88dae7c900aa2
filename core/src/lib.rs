//! Forestlog Core Module
//!
//! Everything a training run needs that does not talk to a tracking server:
//! loading and splitting tabular data, fitting the random forest, scoring it,
//! rendering the confusion matrix, and the recipes that tie those together.

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod recipe;

pub use config::{ConfigManager, Settings};
pub use error::{Error, Result};
pub use model::{ForestModel, ForestParams};
pub use recipe::Recipe;
