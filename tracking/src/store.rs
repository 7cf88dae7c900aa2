//! Storage backends behind the tracking client.

use crate::artifacts::{file_path, parse_uri};
use crate::error::{Result, TrackingError};
use crate::file_store::FileStore;
use crate::rest::RestStore;
use crate::types::{
    Experiment, Metric, ModelVersion, Param, RegisteredModel, RunInfo, RunStatus, RunTag,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Operations a tracking backend provides
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// `None` when no experiment has that name
    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>>;

    /// Create an experiment and return its id
    async fn create_experiment(&self, name: &str) -> Result<String>;

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
        start_time: i64,
        tags: &[RunTag],
    ) -> Result<RunInfo>;

    async fn get_run(&self, run_id: &str) -> Result<RunInfo>;

    async fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()>;

    async fn set_tag(&self, run_id: &str, tag: &RunTag) -> Result<()>;

    async fn update_run(&self, run_id: &str, status: RunStatus, end_time: i64) -> Result<RunInfo>;

    /// Store `contents` at `relative_path` under the run's artifact root
    async fn upload_artifact(
        &self,
        artifact_uri: &str,
        relative_path: &str,
        contents: Vec<u8>,
    ) -> Result<()>;

    /// Fails with [`TrackingError::AlreadyExists`] if the name is taken
    async fn create_registered_model(&self, name: &str) -> Result<RegisteredModel>;

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion>;

    async fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion>;

    /// Where this store points, for log messages
    fn uri(&self) -> &str;
}

/// Pick a backend for `uri`: `http(s)://` talks REST, `file:` URIs and plain
/// paths use a local directory.
pub fn open_store(uri: &str, request_timeout: Duration) -> Result<Arc<dyn TrackingStore>> {
    let store: Arc<dyn TrackingStore> = match parse_uri(uri) {
        None => Arc::new(FileStore::new(uri)),
        Some(url) => match url.scheme() {
            "http" | "https" => Arc::new(RestStore::new(uri, request_timeout)?),
            "file" => Arc::new(FileStore::new(file_path(&url)?)),
            _ => return Err(TrackingError::UnsupportedTrackingUri(uri.to_string())),
        },
    };
    info!("Using tracking store at {}", store.uri());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_by_scheme() {
        let timeout = Duration::from_secs(5);
        assert_eq!(
            open_store("http://localhost:5000/", timeout).unwrap().uri(),
            "http://localhost:5000"
        );
        assert_eq!(open_store("./mlruns", timeout).unwrap().uri(), "./mlruns");
        assert_eq!(
            open_store("file:///tmp/mlruns", timeout).unwrap().uri(),
            "/tmp/mlruns"
        );
        assert!(matches!(
            open_store("databricks://profile", timeout),
            Err(TrackingError::UnsupportedTrackingUri(_))
        ));
    }
}
