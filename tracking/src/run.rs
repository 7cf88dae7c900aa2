//! An open run and everything that can be logged to it.

use crate::artifacts;
use crate::client::TAG_LOG_MODEL_HISTORY;
use crate::error::{Result, TrackingError};
use crate::model::ModelArtifact;
use crate::registry::ModelUri;
use crate::store::TrackingStore;
use crate::types::{now_millis, Metric, Param, RunInfo, RunStatus, RunTag};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct ActiveRun {
    store: Arc<dyn TrackingStore>,
    info: RunInfo,
    model_history: Vec<serde_json::Value>,
}

impl ActiveRun {
    pub(crate) fn new(store: Arc<dyn TrackingStore>, info: RunInfo) -> Self {
        Self {
            store,
            info,
            model_history: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }

    pub fn info(&self) -> &RunInfo {
        &self.info
    }

    pub fn artifact_uri(&self) -> &str {
        &self.info.artifact_uri
    }

    /// `runs:/<run_id>/<artifact_path>`
    pub fn model_uri(&self, artifact_path: &str) -> String {
        ModelUri::new(self.run_id(), artifact_path.trim_matches('/')).to_string()
    }

    pub async fn log_param(&self, key: &str, value: &str) -> Result<()> {
        self.log_params(&[(key.to_string(), value.to_string())]).await
    }

    pub async fn log_params(&self, params: &[(String, String)]) -> Result<()> {
        let params: Vec<Param> = params
            .iter()
            .map(|(key, value)| Param {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        debug!("Logging {} params to run {}", params.len(), self.run_id());
        self.store.log_batch(self.run_id(), &[], &params, &[]).await
    }

    pub async fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        self.log_metrics(&[(key.to_string(), value)]).await
    }

    /// Record metrics at step 0 with the current time
    pub async fn log_metrics(&self, metrics: &[(String, f64)]) -> Result<()> {
        let timestamp = now_millis();
        let metrics: Vec<Metric> = metrics
            .iter()
            .map(|(key, value)| Metric {
                key: key.clone(),
                value: *value,
                timestamp,
                step: 0,
            })
            .collect();
        debug!("Logging {} metrics to run {}", metrics.len(), self.run_id());
        self.store.log_batch(self.run_id(), &metrics, &[], &[]).await
    }

    pub async fn set_tag(&self, key: &str, value: &str) -> Result<()> {
        self.store
            .set_tag(self.run_id(), &RunTag::new(key, value))
            .await
    }

    /// Upload a local file into `artifact_dir` (the artifact root when `None`)
    pub async fn log_artifact(&self, local_path: &Path, artifact_dir: Option<&str>) -> Result<()> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrackingError::InvalidName(local_path.display().to_string()))?;
        let relative = artifacts::join(artifact_dir.unwrap_or(""), file_name);
        let contents = tokio::fs::read(local_path).await?;
        self.upload(&relative, contents).await?;
        info!("Logged artifact {} to run {}", relative, self.run_id());
        Ok(())
    }

    /// Store `text` as the artifact `artifact_file`
    pub async fn log_text(&self, text: &str, artifact_file: &str) -> Result<()> {
        self.upload(artifact_file, text.as_bytes().to_vec()).await?;
        info!("Logged text artifact {} to run {}", artifact_file, self.run_id());
        Ok(())
    }

    /// Upload `model` under `artifact_path` and return its model URI
    pub async fn log_model(&mut self, model: &ModelArtifact, artifact_path: &str) -> Result<String> {
        let artifact_path = artifact_path.trim_matches('/');
        artifacts::validate_relative(artifact_path)?;

        let model_uuid = Uuid::new_v4().simple().to_string();
        let descriptor = model.descriptor(self.run_id(), artifact_path, &model_uuid, Utc::now())?;
        for (name, contents) in model.files(&descriptor)? {
            self.upload(&artifacts::join(artifact_path, &name), contents)
                .await?;
        }

        self.model_history.push(serde_json::json!({
            "run_id": descriptor.run_id,
            "artifact_path": descriptor.artifact_path,
            "utc_time_created": descriptor.utc_time_created,
            "flavors": descriptor.flavors,
            "model_uuid": descriptor.model_uuid,
        }));
        let history = serde_json::to_string(&self.model_history)?;
        self.set_tag(TAG_LOG_MODEL_HISTORY, &history).await?;

        let uri = self.model_uri(artifact_path);
        info!("Logged model {}", uri);
        Ok(uri)
    }

    /// Close the run with `status`
    pub async fn end(self, status: RunStatus) -> Result<RunInfo> {
        let info = self
            .store
            .update_run(self.run_id(), status, now_millis())
            .await?;
        info!("Run {} ended with status {}", info.run_id, status);
        Ok(info)
    }

    async fn upload(&self, relative_path: &str, contents: Vec<u8>) -> Result<()> {
        self.store
            .upload_artifact(&self.info.artifact_uri, relative_path, contents)
            .await
    }
}
