//! Local directory store
//!
//! Mirrors the `mlruns/` layout of a file-backed tracking server:
//!
//! ```text
//! <root>/<experiment_id>/meta.yaml
//! <root>/<experiment_id>/<run_id>/meta.yaml
//! <root>/<experiment_id>/<run_id>/params/<key>
//! <root>/<experiment_id>/<run_id>/metrics/<key>     "<timestamp> <value> <step>" per line
//! <root>/<experiment_id>/<run_id>/tags/<key>
//! <root>/<experiment_id>/<run_id>/artifacts/...
//! <root>/models/<name>/meta.yaml
//! <root>/models/<name>/version-<n>/meta.yaml
//! ```

use crate::artifacts::{self, validate_relative};
use crate::error::{Result, TrackingError};
use crate::store::TrackingStore;
use crate::types::{
    now_millis, Experiment, Metric, ModelVersion, ModelVersionStatus, Param, RegisteredModel,
    RunInfo, RunStatus, RunTag,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

const MODELS_DIR: &str = "models";
const META_FILE: &str = "meta.yaml";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExperimentMeta {
    artifact_location: String,
    creation_time: i64,
    experiment_id: String,
    last_update_time: i64,
    lifecycle_stage: String,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunMeta {
    artifact_uri: String,
    end_time: Option<i64>,
    experiment_id: String,
    lifecycle_stage: String,
    run_id: String,
    run_name: String,
    run_uuid: String,
    start_time: i64,
    status: i32,
    user_id: String,
}

impl RunMeta {
    fn to_info(&self) -> Result<RunInfo> {
        let status = RunStatus::from_code(self.status).ok_or_else(|| {
            TrackingError::Serialization(format!(
                "Unknown status code {} for run {}",
                self.status, self.run_id
            ))
        })?;
        Ok(RunInfo {
            run_id: self.run_id.clone(),
            experiment_id: self.experiment_id.clone(),
            run_name: self.run_name.clone(),
            status,
            start_time: self.start_time,
            end_time: self.end_time,
            artifact_uri: self.artifact_uri.clone(),
            lifecycle_stage: self.lifecycle_stage.clone(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RegisteredModelMeta {
    name: String,
    creation_timestamp: i64,
    last_updated_timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelVersionMeta {
    name: String,
    version: u32,
    creation_timestamp: i64,
    source: String,
    run_id: String,
    status: ModelVersionStatus,
    current_stage: String,
}

impl ModelVersionMeta {
    fn to_version(&self) -> ModelVersion {
        ModelVersion {
            name: self.name.clone(),
            version: self.version.to_string(),
            status: self.status,
            status_message: None,
            source: self.source.clone(),
            run_id: Some(self.run_id.clone()),
            creation_timestamp: Some(self.creation_timestamp),
        }
    }
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let uri = root.display().to_string();
        Self { root, uri }
    }

    async fn experiment_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir()
                && entry.file_name() != MODELS_DIR
                && path.join(META_FILE).exists()
            {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    async fn next_experiment_id(&self) -> Result<String> {
        let mut highest = 0u64;
        for dir in self.experiment_dirs().await? {
            if let Some(id) = dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u64>().ok())
            {
                highest = highest.max(id);
            }
        }
        Ok((highest + 1).to_string())
    }

    async fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        validate_relative(run_id)?;
        for dir in self.experiment_dirs().await? {
            let candidate = dir.join(run_id);
            if candidate.join(META_FILE).exists() {
                return Ok(candidate);
            }
        }
        Err(TrackingError::NotFound(format!("run {}", run_id)))
    }

    async fn read_run(&self, run_id: &str) -> Result<(PathBuf, RunMeta)> {
        let dir = self.run_dir(run_id).await?;
        let meta = read_yaml(&dir.join(META_FILE)).await?;
        Ok((dir, meta))
    }

    fn model_dir(&self, name: &str) -> Result<PathBuf> {
        validate_relative(name)?;
        Ok(self.root.join(MODELS_DIR).join(name))
    }

    async fn write_param(&self, run_dir: &Path, param: &Param) -> Result<()> {
        validate_relative(&param.key)?;
        let path = run_dir.join("params").join(&param.key);
        if let Ok(existing) = tokio::fs::read_to_string(&path).await {
            if existing != param.value {
                return Err(TrackingError::AlreadyExists(format!(
                    "param '{}' already logged as '{}', refusing '{}'",
                    param.key, existing, param.value
                )));
            }
            return Ok(());
        }
        write_file(&path, param.value.as_bytes()).await
    }

    async fn append_metric(&self, run_dir: &Path, metric: &Metric) -> Result<()> {
        validate_relative(&metric.key)?;
        let path = run_dir.join("metrics").join(&metric.key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let line = format!("{} {} {}\n", metric.timestamp, metric.value, metric.step);
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn write_tag(&self, run_dir: &Path, tag: &RunTag) -> Result<()> {
        validate_relative(&tag.key)?;
        write_file(&run_dir.join("tags").join(&tag.key), tag.value.as_bytes()).await
    }
}

async fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_yaml::from_str(&content)?)
}

async fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_file(path, serde_yaml::to_string(value)?.as_bytes()).await
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

#[async_trait]
impl TrackingStore for FileStore {
    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        for dir in self.experiment_dirs().await? {
            let meta: ExperimentMeta = read_yaml(&dir.join(META_FILE)).await?;
            if meta.name == name {
                return Ok(Some(Experiment {
                    experiment_id: meta.experiment_id,
                    name: meta.name,
                    artifact_location: meta.artifact_location,
                    lifecycle_stage: meta.lifecycle_stage,
                }));
            }
        }
        Ok(None)
    }

    async fn create_experiment(&self, name: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(TrackingError::InvalidName(name.to_string()));
        }
        if self.get_experiment_by_name(name).await?.is_some() {
            return Err(TrackingError::AlreadyExists(format!("experiment '{}'", name)));
        }

        let experiment_id = self.next_experiment_id().await?;
        let dir = self.root.join(&experiment_id);
        let now = now_millis();
        let meta = ExperimentMeta {
            artifact_location: dir.display().to_string(),
            creation_time: now,
            experiment_id: experiment_id.clone(),
            last_update_time: now,
            lifecycle_stage: "active".to_string(),
            name: name.to_string(),
        };
        write_yaml(&dir.join(META_FILE), &meta).await?;
        info!("Created experiment '{}' with id {}", name, experiment_id);
        Ok(experiment_id)
    }

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
        start_time: i64,
        tags: &[RunTag],
    ) -> Result<RunInfo> {
        validate_relative(experiment_id)?;
        let experiment_dir = self.root.join(experiment_id);
        if !experiment_dir.join(META_FILE).exists() {
            return Err(TrackingError::NotFound(format!(
                "experiment {}",
                experiment_id
            )));
        }

        let run_id = Uuid::new_v4().simple().to_string();
        let run_dir = experiment_dir.join(&run_id);
        let user_id = tags
            .iter()
            .find(|t| t.key == "mlflow.user")
            .map(|t| t.value.clone())
            .unwrap_or_default();

        let meta = RunMeta {
            artifact_uri: run_dir.join("artifacts").display().to_string(),
            end_time: None,
            experiment_id: experiment_id.to_string(),
            lifecycle_stage: "active".to_string(),
            run_id: run_id.clone(),
            run_name: run_name.to_string(),
            run_uuid: run_id.clone(),
            start_time,
            status: RunStatus::Running.code(),
            user_id,
        };
        write_yaml(&run_dir.join(META_FILE), &meta).await?;
        tokio::fs::create_dir_all(run_dir.join("artifacts")).await?;
        for tag in tags {
            self.write_tag(&run_dir, tag).await?;
        }

        debug!("Created run {} in experiment {}", run_id, experiment_id);
        meta.to_info()
    }

    async fn get_run(&self, run_id: &str) -> Result<RunInfo> {
        let (_, meta) = self.read_run(run_id).await?;
        meta.to_info()
    }

    async fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()> {
        let run_dir = self.run_dir(run_id).await?;
        for param in params {
            self.write_param(&run_dir, param).await?;
        }
        for metric in metrics {
            self.append_metric(&run_dir, metric).await?;
        }
        for tag in tags {
            self.write_tag(&run_dir, tag).await?;
        }
        Ok(())
    }

    async fn set_tag(&self, run_id: &str, tag: &RunTag) -> Result<()> {
        let run_dir = self.run_dir(run_id).await?;
        self.write_tag(&run_dir, tag).await
    }

    async fn update_run(&self, run_id: &str, status: RunStatus, end_time: i64) -> Result<RunInfo> {
        let (dir, mut meta) = self.read_run(run_id).await?;
        meta.status = status.code();
        if status.is_terminal() {
            meta.end_time = Some(end_time);
        }
        write_yaml(&dir.join(META_FILE), &meta).await?;
        meta.to_info()
    }

    async fn upload_artifact(
        &self,
        artifact_uri: &str,
        relative_path: &str,
        contents: Vec<u8>,
    ) -> Result<()> {
        match artifacts::resolve(artifact_uri)? {
            artifacts::ArtifactLocation::Local(root) => {
                artifacts::write_local(&root, relative_path, &contents).await?;
                Ok(())
            }
            artifacts::ArtifactLocation::Proxied(_) => Err(TrackingError::UnsupportedArtifactUri(
                artifact_uri.to_string(),
            )),
        }
    }

    async fn create_registered_model(&self, name: &str) -> Result<RegisteredModel> {
        let dir = self.model_dir(name)?;
        if dir.join(META_FILE).exists() {
            return Err(TrackingError::AlreadyExists(format!(
                "registered model '{}'",
                name
            )));
        }
        let now = now_millis();
        let meta = RegisteredModelMeta {
            name: name.to_string(),
            creation_timestamp: now,
            last_updated_timestamp: now,
        };
        write_yaml(&dir.join(META_FILE), &meta).await?;
        Ok(RegisteredModel {
            name: meta.name,
            creation_timestamp: Some(now),
        })
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion> {
        let dir = self.model_dir(name)?;
        if !dir.join(META_FILE).exists() {
            return Err(TrackingError::NotFound(format!("registered model '{}'", name)));
        }

        let mut highest = 0u32;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(n) = entry
                .file_name()
                .to_str()
                .and_then(|n| n.strip_prefix("version-"))
                .and_then(|n| n.parse::<u32>().ok())
            {
                highest = highest.max(n);
            }
        }

        let meta = ModelVersionMeta {
            name: name.to_string(),
            version: highest + 1,
            creation_timestamp: now_millis(),
            source: source.to_string(),
            run_id: run_id.to_string(),
            status: ModelVersionStatus::Ready,
            current_stage: "None".to_string(),
        };
        write_yaml(
            &dir.join(format!("version-{}", meta.version)).join(META_FILE),
            &meta,
        )
        .await?;
        Ok(meta.to_version())
    }

    async fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion> {
        validate_relative(version)?;
        let path = self
            .model_dir(name)?
            .join(format!("version-{}", version))
            .join(META_FILE);
        if !path.exists() {
            return Err(TrackingError::NotFound(format!(
                "model version {}/{}",
                name, version
            )));
        }
        let meta: ModelVersionMeta = read_yaml(&path).await?;
        Ok(meta.to_version())
    }

    fn uri(&self) -> &str {
        &self.uri
    }
}
