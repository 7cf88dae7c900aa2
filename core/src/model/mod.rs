//! Random-forest classifier and its persistence

pub mod forest;
pub mod persist;

pub use forest::{ForestModel, ForestParams};
