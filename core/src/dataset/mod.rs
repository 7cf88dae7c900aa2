//! Tabular Data
//!
//! Loading a dataset into a [`Table`], deriving columns, selecting the
//! feature matrix and label vector, and splitting rows into train/test sets.

pub mod source;
pub mod split;
pub mod table;

pub use source::{load, BundledDataset, DataSource};
pub use split::{train_test_split, Split};
pub use table::{DerivedColumn, FeatureSpec, LabeledData, Table};
