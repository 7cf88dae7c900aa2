//! Training Recipes
//!
//! A recipe is everything that distinguishes one training procedure from
//! another: where the data lives, which columns are features, how rows are
//! split, which hyperparameter sets to fit, and what gets recorded. The
//! built-in presets reproduce the iris and Pokédex training scripts.

use crate::dataset::{BundledDataset, DataSource, DerivedColumn, FeatureSpec};
use crate::error::{Error, Result};
use crate::evaluation::{Average, MetricName};
use crate::model::ForestParams;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Public Pokédex CSV (800 rows, `Legendary` target)
pub const POKEDEX_URL: &str = "https://gist.githubusercontent.com/armgilles/194bcff35001e7eb53a2a8b441e8b2c6/raw/92200bc0a673d5ce2110aaad4544ed6c4010f687/pokemon.csv";

const POKEMON_STATS: [&str; 6] = ["HP", "Attack", "Defense", "Sp. Atk", "Sp. Def", "Speed"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Experiment the runs are filed under
    pub experiment: String,
    pub data: DataSource,
    #[serde(default)]
    pub derived: Vec<DerivedColumn>,
    pub features: FeatureSpec,
    #[serde(default)]
    pub split: SplitSpec,
    #[serde(default)]
    pub average: Average,
    /// One run per entry
    pub runs: Vec<RunSpec>,
    #[serde(default)]
    pub log: LogSpec,
    /// Registered model name
    #[serde(default)]
    pub register: Option<String>,
    /// Local bincode copy of the fitted model
    #[serde(default)]
    pub save_local: Option<PathBuf>,
    #[serde(default)]
    pub report: Option<ReportSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub test_size: f64,
    pub seed: u64,
}

impl Default for SplitSpec {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub run_name: String,
    pub params: ForestParams,
}

/// What gets recorded on each run besides the hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSpec {
    pub metrics: Vec<MetricName>,
    /// Record the feature list as a `features_used` parameter
    pub features_param: bool,
    pub confusion_matrix: Option<ConfusionMatrixSpec>,
    pub model: Option<ModelLogSpec>,
    pub text_artifacts: Vec<TextArtifact>,
}

impl Default for LogSpec {
    fn default() -> Self {
        Self {
            metrics: vec![MetricName::Accuracy],
            features_param: false,
            confusion_matrix: None,
            model: Some(ModelLogSpec::default()),
            text_artifacts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrixSpec {
    pub file_name: String,
    #[serde(default = "default_matrix_title")]
    pub title: String,
    /// Display names per class; the encoded class labels when absent
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

fn default_matrix_title() -> String {
    "Confusion Matrix".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelLogSpec {
    pub artifact_path: String,
    pub input_example: Option<InputExampleSpec>,
}

impl Default for ModelLogSpec {
    fn default() -> Self {
        Self {
            artifact_path: "model".to_string(),
            input_example: Some(InputExampleSpec::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleSource {
    Train,
    Test,
}

/// Leading rows of one partition stored next to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputExampleSpec {
    pub from: ExampleSource,
    pub rows: usize,
}

impl Default for InputExampleSpec {
    fn default() -> Self {
        Self {
            from: ExampleSource::Test,
            rows: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextArtifact {
    pub file_name: String,
    pub text: String,
}

/// Columns shown for false positives of `positive_label`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSpec {
    pub positive_label: String,
    pub columns: Vec<String>,
}

impl Recipe {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let recipe: Recipe = toml::from_str(content)
            .map_err(|e| Error::Recipe(format!("Failed to parse recipe: {}", e)))?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Recipe(format!("Failed to serialize recipe: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Recipe("name cannot be empty".to_string()));
        }
        if self.experiment.trim().is_empty() {
            return Err(Error::Recipe(format!("{}: experiment cannot be empty", self.name)));
        }
        if self.features.features.is_empty() {
            return Err(Error::Recipe(format!("{}: no feature columns", self.name)));
        }
        if self.features.features.contains(&self.features.target) {
            return Err(Error::Recipe(format!(
                "{}: target '{}' is also listed as a feature",
                self.name, self.features.target
            )));
        }
        if !(self.split.test_size > 0.0 && self.split.test_size < 1.0) {
            return Err(Error::Recipe(format!(
                "{}: test_size must be between 0 and 1, got {}",
                self.name, self.split.test_size
            )));
        }
        if self.runs.is_empty() {
            return Err(Error::Recipe(format!("{}: no runs configured", self.name)));
        }

        let mut seen = HashSet::new();
        for run in &self.runs {
            if !seen.insert(run.run_name.as_str()) {
                return Err(Error::Recipe(format!(
                    "{}: duplicate run name '{}'",
                    self.name, run.run_name
                )));
            }
        }

        if self.log.metrics.is_empty() {
            return Err(Error::Recipe(format!("{}: no metrics selected", self.name)));
        }
        if self.register.is_some() && self.log.model.is_none() {
            return Err(Error::Recipe(format!(
                "{}: registering a model requires logging it",
                self.name
            )));
        }
        Ok(())
    }

    /// Value of the `features_used` parameter, formatted as a list literal
    pub fn features_param(&self) -> String {
        let quoted: Vec<String> = self
            .features
            .features
            .iter()
            .map(|f| format!("'{}'", f))
            .collect();
        format!("[{}]", quoted.join(", "))
    }

    /// Built-in recipe by name
    pub fn preset(name: &str) -> Option<Recipe> {
        Self::presets().into_iter().find(|r| r.name == name)
    }

    pub fn presets() -> Vec<Recipe> {
        vec![
            iris_basic(),
            iris_tuning(),
            iris_registry(),
            legendary(),
            legendary_total(),
        ]
    }
}

fn iris_features() -> FeatureSpec {
    let dataset = BundledDataset::Iris;
    FeatureSpec {
        features: dataset.feature_names(),
        target: dataset.target_name().to_string(),
    }
}

fn iris_basic() -> Recipe {
    Recipe {
        name: "iris-basic".to_string(),
        description: "Single iris run with weighted precision/recall and a text artifact"
            .to_string(),
        experiment: "iris_classification_demo".to_string(),
        data: DataSource::Bundled(BundledDataset::Iris),
        derived: Vec::new(),
        features: iris_features(),
        split: SplitSpec::default(),
        average: Average::Weighted,
        runs: vec![RunSpec {
            run_name: "rf_classifier_v1".to_string(),
            params: ForestParams::new(100, 10),
        }],
        log: LogSpec {
            metrics: vec![
                MetricName::Accuracy,
                MetricName::Precision,
                MetricName::Recall,
            ],
            text_artifacts: vec![TextArtifact {
                file_name: "training_log.txt".to_string(),
                text: "Training completed successfully".to_string(),
            }],
            ..Default::default()
        },
        register: None,
        save_local: None,
        report: None,
    }
}

fn iris_tuning() -> Recipe {
    let grid = [(50, 5), (100, 10), (200, 15), (100, 20), (150, 12)];
    Recipe {
        name: "iris-tuning".to_string(),
        description: "Five iris runs over a small n_estimators/max_depth grid".to_string(),
        experiment: "hyperparameter_tuning".to_string(),
        data: DataSource::Bundled(BundledDataset::Iris),
        derived: Vec::new(),
        features: iris_features(),
        split: SplitSpec::default(),
        average: Average::Weighted,
        runs: grid
            .iter()
            .enumerate()
            .map(|(i, &(n_estimators, max_depth))| RunSpec {
                run_name: format!("rf_tuning_run_{}", i + 1),
                params: ForestParams::new(n_estimators, max_depth),
            })
            .collect(),
        log: LogSpec::default(),
        register: None,
        save_local: None,
        report: None,
    }
}

fn iris_registry() -> Recipe {
    Recipe {
        name: "iris-registry".to_string(),
        description: "Iris run whose model is registered as iris_classifier".to_string(),
        experiment: "model_registry_demo".to_string(),
        data: DataSource::Bundled(BundledDataset::Iris),
        derived: Vec::new(),
        features: iris_features(),
        split: SplitSpec::default(),
        average: Average::Weighted,
        runs: vec![RunSpec {
            run_name: "production_ready_model".to_string(),
            params: ForestParams::new(100, 10),
        }],
        log: LogSpec::default(),
        register: Some("iris_classifier".to_string()),
        save_local: None,
        report: None,
    }
}

fn legendary() -> Recipe {
    Recipe {
        name: "legendary".to_string(),
        description: "Legendary Pokémon from the six base stats, with a confusion matrix"
            .to_string(),
        experiment: "Pokemon_Legendary_Predictor".to_string(),
        data: DataSource::Url(POKEDEX_URL.to_string()),
        derived: Vec::new(),
        features: FeatureSpec {
            features: POKEMON_STATS.iter().map(|s| s.to_string()).collect(),
            target: "Legendary".to_string(),
        },
        split: SplitSpec::default(),
        average: Average::Binary { positive: 1 },
        runs: vec![RunSpec {
            run_name: "Legendary_Hunter_v1".to_string(),
            params: ForestParams::new(100, 15),
        }],
        log: LogSpec {
            metrics: vec![
                MetricName::Accuracy,
                MetricName::Precision,
                MetricName::Recall,
            ],
            features_param: true,
            confusion_matrix: Some(ConfusionMatrixSpec {
                file_name: "confusion_matrix.png".to_string(),
                title: "Legendary Prediction Confusion Matrix".to_string(),
                labels: Some(vec!["Normal".to_string(), "Legendary".to_string()]),
            }),
            model: Some(ModelLogSpec {
                artifact_path: "model".to_string(),
                input_example: Some(InputExampleSpec {
                    from: ExampleSource::Train,
                    rows: 5,
                }),
            }),
            text_artifacts: Vec::new(),
        },
        register: None,
        save_local: None,
        report: None,
    }
}

fn legendary_total() -> Recipe {
    let mut features: Vec<String> = POKEMON_STATS.iter().map(|s| s.to_string()).collect();
    features.push("Generation".to_string());
    features.push("Total_Stats".to_string());

    Recipe {
        name: "legendary-total".to_string(),
        description: "Legendary Pokémon with Generation and Total_Stats; saved locally for the impostor report"
            .to_string(),
        experiment: "Pokemon_Legendary_Predictor".to_string(),
        data: DataSource::Url(POKEDEX_URL.to_string()),
        derived: vec![DerivedColumn {
            name: "Total_Stats".to_string(),
            sum_of: POKEMON_STATS.iter().map(|s| s.to_string()).collect(),
        }],
        features: FeatureSpec {
            features,
            target: "Legendary".to_string(),
        },
        split: SplitSpec::default(),
        average: Average::Binary { positive: 1 },
        runs: vec![RunSpec {
            run_name: "Legendary_Hunter_v2".to_string(),
            params: ForestParams::new(100, 15),
        }],
        log: LogSpec {
            metrics: vec![
                MetricName::Accuracy,
                MetricName::Precision,
                MetricName::Recall,
            ],
            features_param: true,
            confusion_matrix: Some(ConfusionMatrixSpec {
                file_name: "confusion_matrix.png".to_string(),
                title: "Legendary Prediction Confusion Matrix".to_string(),
                labels: Some(vec!["Normal".to_string(), "Legendary".to_string()]),
            }),
            model: Some(ModelLogSpec {
                artifact_path: "model".to_string(),
                input_example: Some(InputExampleSpec {
                    from: ExampleSource::Train,
                    rows: 5,
                }),
            }),
            text_artifacts: Vec::new(),
        },
        register: None,
        save_local: Some(PathBuf::from("my_model.bin")),
        report: Some(ReportSpec {
            positive_label: "True".to_string(),
            columns: vec!["Name".to_string(), "Total_Stats".to_string()],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid_and_unique() {
        let presets = Recipe::presets();
        let names: HashSet<&str> = presets.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), presets.len());
        for recipe in &presets {
            recipe.validate().unwrap();
        }
    }

    #[test]
    fn test_tuning_grid() {
        let recipe = Recipe::preset("iris-tuning").unwrap();
        let grid: Vec<(u16, Option<u16>)> = recipe
            .runs
            .iter()
            .map(|r| (r.params.n_estimators, r.params.max_depth))
            .collect();
        assert_eq!(
            grid,
            vec![
                (50, Some(5)),
                (100, Some(10)),
                (200, Some(15)),
                (100, Some(20)),
                (150, Some(12))
            ]
        );
        assert_eq!(recipe.runs[4].run_name, "rf_tuning_run_5");
    }

    #[test]
    fn test_features_param_format() {
        let recipe = Recipe::preset("legendary").unwrap();
        assert_eq!(
            recipe.features_param(),
            "['HP', 'Attack', 'Defense', 'Sp. Atk', 'Sp. Def', 'Speed']"
        );
    }

    #[test]
    fn test_toml_recipe_with_defaults() {
        let recipe = Recipe::from_toml_str(
            r#"
            name = "wine"
            experiment = "wine_quality"
            data = { file = "data/wine.csv" }

            [features]
            features = ["alcohol", "acidity"]
            target = "quality"

            [[runs]]
            run_name = "shallow"
            params = { n_estimators = 20, max_depth = 3 }

            [[runs]]
            run_name = "deep"
            params = { n_estimators = 20 }
            "#,
        )
        .unwrap();

        assert_eq!(recipe.split, SplitSpec::default());
        assert_eq!(recipe.runs[1].params.max_depth, None);
        assert_eq!(recipe.runs[1].params.random_state, 42);
        assert_eq!(recipe.log.metrics, vec![MetricName::Accuracy]);
        assert_eq!(recipe.log.model, Some(ModelLogSpec::default()));
        assert_eq!(recipe.data, DataSource::File(PathBuf::from("data/wine.csv")));
    }

    #[test]
    fn test_preset_survives_toml() {
        let recipe = Recipe::preset("legendary-total").unwrap();
        let parsed = Recipe::from_toml_str(&recipe.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, recipe);
    }

    #[test]
    fn test_validation_failures() {
        let mut recipe = Recipe::preset("iris-basic").unwrap();
        recipe.runs.push(recipe.runs[0].clone());
        assert!(matches!(recipe.validate(), Err(Error::Recipe(msg)) if msg.contains("duplicate")));

        let mut recipe = Recipe::preset("iris-registry").unwrap();
        recipe.log.model = None;
        assert!(recipe.validate().is_err());

        let mut recipe = Recipe::preset("legendary").unwrap();
        recipe.split.test_size = 1.5;
        assert!(recipe.validate().is_err());

        let mut recipe = Recipe::preset("legendary").unwrap();
        recipe.features.features.push("Legendary".to_string());
        assert!(recipe.validate().is_err());
    }
}
