//! Recipe runner
//!
//! Turns a [`Recipe`] into tracked runs: load the table, derive and select
//! columns, split, then for each run fit, score and record everything the
//! recipe asks for. Also replays a recipe's split against a locally saved
//! model to list its false positives.

use anyhow::{anyhow, bail, Context, Result};
use forestlog_core::dataset::{self, LabeledData, Split, Table};
use forestlog_core::evaluation::{
    false_positives, render_confusion_matrix, ClassificationMetrics, ConfusionMatrix, RowReport,
};
use forestlog_core::recipe::{ExampleSource, ModelLogSpec, Recipe, RunSpec};
use forestlog_core::{ForestModel, Settings};
use forestlog_tracking::{
    ActiveRun, ClientOptions, ColumnSpec, InputExample, ModelArtifact, ModelSignature,
    ModelVersion, RegistrationPolicy, RunStatus, TrackingClient,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const IMPOSTOR_TITLE: &str = "THE IMPOSTORS (False Positives)";

/// What one run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub run_name: String,
    pub metrics: Vec<(String, f64)>,
    pub model_uri: Option<String>,
    pub model_version: Option<ModelVersion>,
}

/// What a whole recipe produced
#[derive(Debug, Clone)]
pub struct RecipeOutcome {
    pub recipe: String,
    pub experiment_id: String,
    pub runs: Vec<RunOutcome>,
    /// Local copy of the last run's model
    pub saved_model: Option<PathBuf>,
}

/// Table, selected data and partition shared by every run of a recipe
pub struct PreparedData {
    pub table: Table,
    pub data: LabeledData,
    pub split: Split,
}

/// Tracking client for the configured URI
pub fn connect(settings: &Settings) -> Result<TrackingClient> {
    let tracking = &settings.tracking;
    let client = TrackingClient::connect(
        &tracking.uri,
        ClientOptions {
            request_timeout: Duration::from_secs(tracking.request_timeout_seconds),
            registration: RegistrationPolicy {
                timeout: Duration::from_secs(tracking.registration_timeout_seconds),
                poll_interval: Duration::from_millis(tracking.registration_poll_millis),
            },
            user: tracking.user.clone(),
            source_name: env!("CARGO_PKG_NAME").to_string(),
        },
    )?;
    Ok(client)
}

/// HTTP client for dataset downloads
pub fn http_client(settings: &Settings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.tracking.request_timeout_seconds))
        .build()?;
    Ok(client)
}

/// Load, derive, select and split the recipe's data
pub async fn prepare_data(recipe: &Recipe, http: &reqwest::Client) -> Result<PreparedData> {
    info!("Downloading dataset from {}", recipe.data);
    let table = dataset::load(&recipe.data, http)
        .await
        .with_context(|| format!("Failed to load dataset from {}", recipe.data))?
        .with_derived(&recipe.derived)?;

    let data = table.select(&recipe.features)?;
    let split = dataset::train_test_split(&data, recipe.split.test_size, recipe.split.seed)?;
    info!(
        "Prepared {} train / {} test samples with {} features",
        split.train.len(),
        split.test.len(),
        data.n_features()
    );

    Ok(PreparedData { table, data, split })
}

/// Execute every run of `recipe` and record it through `client`
pub async fn run_recipe(
    recipe: &Recipe,
    client: &TrackingClient,
    http: &reqwest::Client,
    settings: &Settings,
) -> Result<RecipeOutcome> {
    recipe.validate()?;
    info!("Tracking to: {}", client.tracking_uri());
    info!("Experiment: {}", recipe.experiment);

    let experiment = client
        .set_experiment(&recipe.experiment)
        .await
        .with_context(|| format!("Failed to set experiment '{}'", recipe.experiment))?;
    let prepared = prepare_data(recipe, http).await?;

    let mut outcomes = Vec::with_capacity(recipe.runs.len());
    let mut last_model = None;
    for spec in &recipe.runs {
        let mut run = client
            .start_run(&experiment, &spec.run_name)
            .await
            .with_context(|| format!("Failed to start run '{}'", spec.run_name))?;

        match execute_run(recipe, spec, &prepared, &mut run, client, settings).await {
            Ok((outcome, model)) => {
                run.end(RunStatus::Finished).await?;
                outcomes.push(outcome);
                last_model = Some(model);
            }
            Err(e) => {
                if let Err(end_error) = run.end(RunStatus::Failed).await {
                    warn!("Could not mark run '{}' as failed: {}", spec.run_name, end_error);
                }
                return Err(e.context(format!("Run '{}' failed", spec.run_name)));
            }
        }
    }

    let saved_model = match (&recipe.save_local, last_model) {
        (Some(path), Some(model)) => {
            let target = settings.output_dir.join(path);
            model.save(&target)?;
            info!("Model saved locally to {}", target.display());
            Some(target)
        }
        _ => None,
    };

    Ok(RecipeOutcome {
        recipe: recipe.name.clone(),
        experiment_id: experiment.experiment_id,
        runs: outcomes,
        saved_model,
    })
}

async fn execute_run(
    recipe: &Recipe,
    spec: &RunSpec,
    prepared: &PreparedData,
    run: &mut ActiveRun,
    client: &TrackingClient,
    settings: &Settings,
) -> Result<(RunOutcome, ForestModel)> {
    let mut params = spec.params.as_params();
    if recipe.log.features_param {
        params.push(("features_used".to_string(), recipe.features_param()));
    }
    run.log_params(&params).await?;

    info!("Training model...");
    let model = ForestModel::fit(&prepared.split.train, &spec.params)?;
    let predictions = model.predict(&prepared.split.test.features)?;

    let matrix = ConfusionMatrix::new(
        &prepared.split.test.targets,
        &predictions,
        prepared.data.n_classes(),
    )?;
    let metrics = ClassificationMetrics::from_confusion(&matrix, recipe.average)?;
    let selected = metrics.select(&recipe.log.metrics);
    info!(
        "{}",
        selected
            .iter()
            .map(|(key, value)| format!("{}: {:.4}", key, value))
            .collect::<Vec<_>>()
            .join(" | ")
    );
    run.log_metrics(&selected).await?;

    if let Some(cm) = &recipe.log.confusion_matrix {
        let labels = cm
            .labels
            .clone()
            .unwrap_or_else(|| model.class_labels().to_vec());
        let path = settings.output_dir.join(&cm.file_name);
        render_confusion_matrix(&matrix, &labels, &cm.title, &path)?;
        run.log_artifact(&path, None).await?;
    }

    for text in &recipe.log.text_artifacts {
        run.log_text(&text.text, &text.file_name).await?;
    }

    let mut model_uri = None;
    let mut model_version = None;
    if let Some(model_spec) = &recipe.log.model {
        let artifact = model_artifact(&model, recipe, &prepared.split, model_spec)?;
        let uri = run.log_model(&artifact, &model_spec.artifact_path).await?;

        if let Some(name) = &recipe.register {
            match client.register_model(&uri, name).await {
                Ok(version) => {
                    info!(
                        "Model registered as: {}, Version: {}",
                        version.name, version.version
                    );
                    model_version = Some(version);
                }
                Err(e) => warn!(
                    "Model registration under '{}' failed: {}. It may already be registered; check the tracking UI for existing versions",
                    name, e
                ),
            }
        }
        model_uri = Some(uri);
    }

    let outcome = RunOutcome {
        run_id: run.run_id().to_string(),
        run_name: spec.run_name.clone(),
        metrics: selected,
        model_uri,
        model_version,
    };
    Ok((outcome, model))
}

/// Package a fitted model for upload
pub fn model_artifact(
    model: &ForestModel,
    recipe: &Recipe,
    split: &Split,
    spec: &ModelLogSpec,
) -> Result<ModelArtifact> {
    let signature = ModelSignature {
        inputs: model
            .feature_names()
            .iter()
            .map(|name| ColumnSpec::new(name.as_str(), "double"))
            .collect(),
        outputs: vec![ColumnSpec::new(
            recipe.features.target.as_str(),
            output_type(model.class_labels()),
        )],
    };

    let input_example = spec.input_example.map(|example| {
        let rows = match example.from {
            ExampleSource::Train => split.train.head(example.rows),
            ExampleSource::Test => split.test.head(example.rows),
        };
        InputExample {
            columns: rows.feature_names.clone(),
            data: rows.features.outer_iter().map(|row| row.to_vec()).collect(),
        }
    });

    let flavor_config = BTreeMap::from([
        (
            "estimator".to_string(),
            "RandomForestClassifier".to_string(),
        ),
        ("model_format".to_string(), "json".to_string()),
        ("class_labels".to_string(), model.class_labels().join(",")),
        (
            "forestlog_version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        ),
        ("trained_at".to_string(), model.trained_at().to_rfc3339()),
    ]);

    Ok(ModelArtifact {
        flavor: "smartcore".to_string(),
        flavor_config,
        model_file: "model.json".to_string(),
        model_bytes: model.to_json()?.into_bytes(),
        signature: Some(signature),
        input_example,
    })
}

/// Signature type of the predicted labels
fn output_type(class_labels: &[String]) -> &'static str {
    if class_labels == ["False", "True"] {
        "boolean"
    } else if class_labels.iter().all(|label| label.parse::<i64>().is_ok()) {
        "long"
    } else {
        "string"
    }
}

/// Rows of the recipe's test split that `model_path` predicts as the
/// report's positive class while they are actually something else
pub async fn detect_impostors(
    recipe: &Recipe,
    model_path: &Path,
    http: &reqwest::Client,
) -> Result<RowReport> {
    let report = recipe
        .report
        .as_ref()
        .ok_or_else(|| anyhow!("Recipe '{}' has no impostor report configured", recipe.name))?;

    info!("Loading model from local file '{}'...", model_path.display());
    let model = ForestModel::load(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;
    let prepared = prepare_data(recipe, http).await?;

    if model.feature_names() != prepared.data.feature_names.as_slice() {
        bail!(
            "Model was trained on {:?} but recipe '{}' selects {:?}",
            model.feature_names(),
            recipe.name,
            prepared.data.feature_names
        );
    }
    if model.class_labels() != prepared.data.class_labels.as_slice() {
        bail!(
            "Model classes {:?} do not match the data's {:?}",
            model.class_labels(),
            prepared.data.class_labels
        );
    }

    let positive = prepared
        .data
        .class_index(&report.positive_label)
        .ok_or_else(|| {
            anyhow!(
                "Class '{}' does not occur in column '{}'",
                report.positive_label,
                recipe.features.target
            )
        })?;

    let test = &prepared.split.test;
    let predictions = model.predict(&test.features)?;
    let rows: Vec<usize> = false_positives(&test.targets, &predictions, positive)
        .into_iter()
        .map(|pos| test.row_ids[pos])
        .collect();
    info!("{} false positives among {} test rows", rows.len(), test.len());

    Ok(RowReport::build(
        IMPOSTOR_TITLE,
        &prepared.table,
        &rows,
        &report.columns,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forestlog_core::dataset::{BundledDataset, DataSource};
    use forestlog_core::recipe::InputExampleSpec;

    fn iris_split() -> (Recipe, Split) {
        let recipe = Recipe::preset("iris-basic").unwrap();
        let table = Table::from_csv_bytes(BundledDataset::Iris.csv().as_bytes().to_vec()).unwrap();
        let data = table.select(&recipe.features).unwrap();
        let split = dataset::train_test_split(&data, 0.2, 42).unwrap();
        (recipe, split)
    }

    #[test]
    fn test_model_artifact_layout() {
        let (recipe, split) = iris_split();
        let model = ForestModel::fit(&split.train, &recipe.runs[0].params).unwrap();
        let spec = ModelLogSpec {
            artifact_path: "model".to_string(),
            input_example: Some(InputExampleSpec {
                from: ExampleSource::Test,
                rows: 5,
            }),
        };

        let artifact = model_artifact(&model, &recipe, &split, &spec).unwrap();
        let example = artifact.input_example.unwrap();
        assert_eq!(example.data.len(), 5);
        assert_eq!(example.columns, BundledDataset::Iris.feature_names());
        assert_eq!(example.data[0], split.test.features.row(0).to_vec());

        let signature = artifact.signature.unwrap();
        assert_eq!(signature.inputs.len(), 4);
        assert_eq!(signature.outputs[0].name, "species");
        assert_eq!(signature.outputs[0].dtype, "string");
        assert_eq!(
            artifact.flavor_config["trained_at"],
            model.trained_at().to_rfc3339()
        );

        let restored =
            ForestModel::from_json(std::str::from_utf8(&artifact.model_bytes).unwrap()).unwrap();
        assert_eq!(restored.class_labels(), model.class_labels());
    }

    #[test]
    fn test_output_type_follows_labels() {
        let labels = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        assert_eq!(output_type(&labels(&["False", "True"])), "boolean");
        assert_eq!(output_type(&labels(&["1", "2", "3"])), "long");
        assert_eq!(output_type(&labels(&["setosa", "versicolor"])), "string");
    }

    #[tokio::test]
    async fn test_prepare_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iris.csv");
        std::fs::write(&path, BundledDataset::Iris.csv()).unwrap();

        let mut recipe = Recipe::preset("iris-basic").unwrap();
        recipe.data = DataSource::File(path);
        let prepared = prepare_data(&recipe, &reqwest::Client::new()).await.unwrap();

        assert_eq!(prepared.split.test.len(), 30);
        assert_eq!(prepared.split.train.len(), 120);
        assert_eq!(prepared.data.n_classes(), 3);
    }

    #[tokio::test]
    async fn test_impostors_need_a_report() {
        let recipe = Recipe::preset("legendary").unwrap();
        let err = detect_impostors(&recipe, Path::new("missing.bin"), &reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no impostor report"));
    }
}
