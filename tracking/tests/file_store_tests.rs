//! File store integration tests
//!
//! Drives the tracking client against a local `mlruns/` directory and
//! checks the files it leaves behind.

use forestlog_tracking::{
    ClientOptions, FileStore, ModelArtifact, ModelVersionStatus, RunStatus, TrackingClient,
    TrackingError, TrackingStore,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// Test helper: Client over a fresh directory
fn client(dir: &TempDir) -> TrackingClient {
    TrackingClient::connect(
        &dir.path().join("mlruns").display().to_string(),
        ClientOptions {
            user: Some("tester".to_string()),
            ..Default::default()
        },
    )
    .unwrap()
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn model() -> ModelArtifact {
    ModelArtifact {
        flavor: "smartcore".to_string(),
        flavor_config: BTreeMap::new(),
        model_file: "model.json".to_string(),
        model_bytes: b"{}".to_vec(),
        signature: None,
        input_example: None,
    }
}

#[tokio::test]
async fn test_run_layout_on_disk() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);

    let experiment = client.set_experiment("hyperparameter_tuning").await.unwrap();
    assert_eq!(experiment.experiment_id, "1");
    let run = client.start_run(&experiment, "rf_tuning_run_1").await.unwrap();
    run.log_param("n_estimators", "50").await.unwrap();
    run.log_metric("accuracy", 0.95).await.unwrap();
    run.log_metric("accuracy", 0.97).await.unwrap();
    let run_id = run.run_id().to_string();
    run.end(RunStatus::Finished).await.unwrap();

    let run_dir = dir.path().join("mlruns").join("1").join(&run_id);
    assert_eq!(read(&run_dir.join("params/n_estimators")), "50");
    assert_eq!(read(&run_dir.join("tags/mlflow.runName")), "rf_tuning_run_1");
    assert_eq!(read(&run_dir.join("tags/mlflow.user")), "tester");

    let lines: Vec<String> = read(&run_dir.join("metrics/accuracy"))
        .lines()
        .map(String::from)
        .collect();
    assert_eq!(lines.len(), 2);
    let fields: Vec<&str> = lines[1].split(' ').collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[1], "0.97");
    assert_eq!(fields[2], "0");

    let meta = read(&run_dir.join("meta.yaml"));
    assert!(meta.contains("status: 3"));
    assert!(meta.contains("run_name: rf_tuning_run_1"));

    let info = client.get_run(&run_id).await.unwrap();
    assert_eq!(info.status, RunStatus::Finished);
    assert!(info.end_time.is_some());
}

#[tokio::test]
async fn test_experiments_are_reused_by_name() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);

    let first = client.set_experiment("iris_classification_demo").await.unwrap();
    let second = client.set_experiment("model_registry_demo").await.unwrap();
    let again = client.set_experiment("iris_classification_demo").await.unwrap();

    assert_eq!(first.experiment_id, again.experiment_id);
    assert_ne!(first.experiment_id, second.experiment_id);
    assert!(matches!(
        client.store().create_experiment("model_registry_demo").await,
        Err(TrackingError::AlreadyExists(_))
    ));
}

#[tokio::test]
async fn test_params_are_immutable() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);
    let experiment = client.set_experiment("exp").await.unwrap();
    let run = client.start_run(&experiment, "run").await.unwrap();

    run.log_param("max_depth", "10").await.unwrap();
    run.log_param("max_depth", "10").await.unwrap();
    assert!(matches!(
        run.log_param("max_depth", "15").await,
        Err(TrackingError::AlreadyExists(_))
    ));
}

#[tokio::test]
async fn test_artifacts_and_registry() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);
    let experiment = client.set_experiment("Pokemon_Legendary_Predictor").await.unwrap();
    let mut run = client
        .start_run(&experiment, "Legendary_Hunter_v1")
        .await
        .unwrap();

    let png = dir.path().join("confusion_matrix.png");
    std::fs::write(&png, b"\x89PNG").unwrap();
    run.log_artifact(&png, None).await.unwrap();
    run.log_artifact(&png, Some("plots")).await.unwrap();
    let model_uri = run.log_model(&model(), "model").await.unwrap();
    let artifact_root = run.artifact_uri().to_string();
    run.end(RunStatus::Finished).await.unwrap();

    let root = Path::new(&artifact_root);
    assert!(root.join("confusion_matrix.png").exists());
    assert!(root.join("plots/confusion_matrix.png").exists());
    assert!(read(&root.join("model/MLmodel")).contains("model_data: model.json"));

    let v1 = client.register_model(&model_uri, "legendary").await.unwrap();
    let v2 = client.register_model(&model_uri, "legendary").await.unwrap();
    assert_eq!((v1.version.as_str(), v2.version.as_str()), ("1", "2"));
    assert_eq!(v2.status, ModelVersionStatus::Ready);
    assert_eq!(v2.source, format!("{}/model", artifact_root));

    let fetched = client
        .store()
        .get_model_version("legendary", "2")
        .await
        .unwrap();
    assert_eq!(fetched, v2);
    assert!(dir
        .path()
        .join("mlruns/models/legendary/version-2/meta.yaml")
        .exists());
}

#[tokio::test]
async fn test_unknown_run_and_proxied_uri() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));

    assert!(matches!(
        store.get_run("0123456789abcdef").await,
        Err(TrackingError::NotFound(_))
    ));
    assert!(matches!(
        store
            .upload_artifact("mlflow-artifacts:/1/abc/artifacts", "x.txt", Vec::new())
            .await,
        Err(TrackingError::UnsupportedArtifactUri(_))
    ));
}
