//! Random Forest Training
//!
//! Thin wrapper around smartcore's `RandomForestClassifier` that keeps the
//! feature names, class labels and hyperparameters next to the fitted trees.

use crate::dataset::LabeledData;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::time::Instant;
use tracing::info;

type Forest = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: u16,
    /// `None` grows trees until leaves are pure
    #[serde(default)]
    pub max_depth: Option<u16>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_random_state() -> u64 {
    42
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            random_state: default_random_state(),
        }
    }
}

impl ForestParams {
    pub fn new(n_estimators: u16, max_depth: u16) -> Self {
        Self {
            n_estimators,
            max_depth: Some(max_depth),
            ..Default::default()
        }
    }

    /// Key/value pairs recorded as run parameters
    pub fn as_params(&self) -> Vec<(String, String)> {
        vec![
            ("n_estimators".to_string(), self.n_estimators.to_string()),
            (
                "max_depth".to_string(),
                self.max_depth
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "None".to_string()),
            ),
            ("random_state".to_string(), self.random_state.to_string()),
        ]
    }

    fn to_smartcore(&self) -> RandomForestClassifierParameters {
        let params = RandomForestClassifierParameters::default()
            .with_n_trees(self.n_estimators)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_seed(self.random_state);

        match self.max_depth {
            Some(depth) => params.with_max_depth(depth),
            None => params,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::InvalidInput("n_estimators must be at least 1".to_string()));
        }
        if self.max_depth == Some(0) {
            return Err(Error::InvalidInput("max_depth must be at least 1".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(Error::InvalidInput(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::InvalidInput(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A fitted random forest plus what is needed to interpret it
#[derive(Debug, Serialize, Deserialize)]
pub struct ForestModel {
    params: ForestParams,
    feature_names: Vec<String>,
    class_labels: Vec<String>,
    training_samples: usize,
    trained_at: DateTime<Utc>,
    forest: Forest,
}

impl ForestModel {
    /// Fit a forest on `data`
    pub fn fit(data: &LabeledData, params: &ForestParams) -> Result<Self> {
        info!(
            "Starting Random Forest training with {} samples and {} features",
            data.len(),
            data.n_features()
        );

        params.validate()?;

        // Validate input data
        if data.features.nrows() != data.targets.len() {
            return Err(Error::InvalidInput(format!(
                "Features and targets must have same number of samples: {} vs {}",
                data.features.nrows(),
                data.targets.len()
            )));
        }

        if data.is_empty() || data.n_features() == 0 {
            return Err(Error::InvalidInput(
                "Features and targets cannot be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let x = to_dense(&data.features)?;
        let y: Vec<u32> = data.targets.to_vec();

        let forest = Forest::fit(&x, &y, params.to_smartcore())
            .map_err(|e| Error::Training(format!("{}", e)))?;

        info!(
            "Random Forest training completed in {} ms",
            started.elapsed().as_millis()
        );

        Ok(Self {
            params: params.clone(),
            feature_names: data.feature_names.clone(),
            class_labels: data.class_labels.clone(),
            training_samples: data.len(),
            trained_at: Utc::now(),
            forest,
        })
    }

    /// Predict class indices for each row
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<u32>> {
        if features.ncols() != self.feature_names.len() {
            return Err(Error::Prediction(format!(
                "Model expects {} features, got {}",
                self.feature_names.len(),
                features.ncols()
            )));
        }
        if features.nrows() == 0 {
            return Ok(Array1::from(Vec::new()));
        }

        let x = to_dense(features)?;
        let predictions = self
            .forest
            .predict(&x)
            .map_err(|e| Error::Prediction(format!("{}", e)))?;
        Ok(Array1::from(predictions))
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }
}

fn to_dense(features: &Array2<f64>) -> Result<DenseMatrix<f64>> {
    let rows: Vec<Vec<f64>> = features.outer_iter().map(|row| row.to_vec()).collect();
    DenseMatrix::from_2d_vec(&rows)
        .map_err(|e| Error::InvalidInput(format!("Failed to create feature matrix: {}", e)))
}
