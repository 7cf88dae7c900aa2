//! Tracking client
//!
//! Entry point for recording runs: resolves experiments by name, opens runs
//! with the standard source tags, and registers logged models.

use crate::error::{Result, TrackingError};
use crate::registry::{self, ModelUri, RegistrationPolicy};
use crate::run::ActiveRun;
use crate::store::{open_store, TrackingStore};
use crate::types::{now_millis, Experiment, ModelVersion, RunInfo, RunTag};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const TAG_RUN_NAME: &str = "mlflow.runName";
pub const TAG_USER: &str = "mlflow.user";
pub const TAG_SOURCE_NAME: &str = "mlflow.source.name";
pub const TAG_SOURCE_TYPE: &str = "mlflow.source.type";
pub const TAG_LOG_MODEL_HISTORY: &str = "mlflow.log-model.history";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub registration: RegistrationPolicy,
    /// Falls back to `$USER`, then `unknown`
    pub user: Option<String>,
    /// Recorded as `mlflow.source.name`
    pub source_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            registration: RegistrationPolicy::default(),
            user: None,
            source_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

#[derive(Clone)]
pub struct TrackingClient {
    store: Arc<dyn TrackingStore>,
    user: String,
    source_name: String,
    registration: RegistrationPolicy,
}

impl TrackingClient {
    /// Open the store behind `uri` and wrap it
    pub fn connect(uri: &str, options: ClientOptions) -> Result<Self> {
        let store = open_store(uri, options.request_timeout)?;
        Ok(Self::new(store, options))
    }

    pub fn new(store: Arc<dyn TrackingStore>, options: ClientOptions) -> Self {
        let user = options
            .user
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            store,
            user,
            source_name: options.source_name,
            registration: options.registration,
        }
    }

    pub fn store(&self) -> &Arc<dyn TrackingStore> {
        &self.store
    }

    pub fn tracking_uri(&self) -> &str {
        self.store.uri()
    }

    /// Experiment called `name`, created if it does not exist yet
    pub async fn set_experiment(&self, name: &str) -> Result<Experiment> {
        if let Some(experiment) = self.store.get_experiment_by_name(name).await? {
            if !experiment.is_active() {
                return Err(TrackingError::InvalidName(format!(
                    "{} (experiment is {})",
                    name, experiment.lifecycle_stage
                )));
            }
            return Ok(experiment);
        }

        let experiment_id = match self.store.create_experiment(name).await {
            Ok(id) => id,
            // Lost a race with another client creating the same experiment
            Err(TrackingError::AlreadyExists(_)) => {
                return self
                    .store
                    .get_experiment_by_name(name)
                    .await?
                    .ok_or_else(|| TrackingError::NotFound(format!("experiment '{}'", name)));
            }
            Err(e) => return Err(e),
        };
        info!("Experiment '{}' created with id {}", name, experiment_id);

        self.store
            .get_experiment_by_name(name)
            .await?
            .ok_or_else(|| TrackingError::NotFound(format!("experiment '{}'", name)))
    }

    /// Open a run in `experiment`
    pub async fn start_run(&self, experiment: &Experiment, run_name: &str) -> Result<ActiveRun> {
        let tags = vec![
            RunTag::new(TAG_RUN_NAME, run_name),
            RunTag::new(TAG_USER, self.user.as_str()),
            RunTag::new(TAG_SOURCE_NAME, self.source_name.as_str()),
            RunTag::new(TAG_SOURCE_TYPE, "LOCAL"),
        ];
        let info = self
            .store
            .create_run(&experiment.experiment_id, run_name, now_millis(), &tags)
            .await?;
        info!(
            "Started run '{}' ({}) in experiment '{}'",
            run_name, info.run_id, experiment.name
        );
        Ok(ActiveRun::new(Arc::clone(&self.store), info))
    }

    pub async fn get_run(&self, run_id: &str) -> Result<RunInfo> {
        self.store.get_run(run_id).await
    }

    /// Register the model logged at `model_uri` as a new version of `name`
    pub async fn register_model(&self, model_uri: &str, name: &str) -> Result<ModelVersion> {
        let uri: ModelUri = model_uri.parse()?;
        registry::register_model(self.store.as_ref(), &uri, name, &self.registration).await
    }
}
