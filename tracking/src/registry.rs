//! Model registry: register a logged model under a name and wait for the
//! new version to become ready.

use crate::artifacts;
use crate::error::{Result, TrackingError};
use crate::store::TrackingStore;
use crate::types::{ModelVersion, ModelVersionStatus};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// `runs:/<run_id>/<artifact_path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUri {
    pub run_id: String,
    pub artifact_path: String,
}

impl ModelUri {
    pub fn new(run_id: impl Into<String>, artifact_path: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            artifact_path: artifact_path.into(),
        }
    }
}

impl FromStr for ModelUri {
    type Err = TrackingError;

    fn from_str(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("runs:/")
            .ok_or_else(|| TrackingError::InvalidModelUri(uri.to_string()))?;
        let (run_id, artifact_path) = rest
            .trim_start_matches('/')
            .split_once('/')
            .ok_or_else(|| TrackingError::InvalidModelUri(uri.to_string()))?;
        let artifact_path = artifact_path.trim_matches('/');
        if run_id.is_empty() || artifact_path.is_empty() {
            return Err(TrackingError::InvalidModelUri(uri.to_string()));
        }
        Ok(Self::new(run_id, artifact_path))
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runs:/{}/{}", self.run_id, self.artifact_path)
    }
}

/// How long to wait for a new version to leave `PENDING_REGISTRATION`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Register the model at `model_uri` as a new version of `name`.
///
/// The registered model is created on first use; an existing one is reused.
pub async fn register_model(
    store: &dyn TrackingStore,
    model_uri: &ModelUri,
    name: &str,
    policy: &RegistrationPolicy,
) -> Result<ModelVersion> {
    match store.create_registered_model(name).await {
        Ok(_) => info!("Successfully registered model '{}'", name),
        Err(TrackingError::AlreadyExists(_)) => {
            debug!("Registered model '{}' already exists", name)
        }
        Err(e) => return Err(e),
    }

    let run = store.get_run(&model_uri.run_id).await?;
    let source = artifacts::join(&run.artifact_uri, &model_uri.artifact_path);
    let version = store
        .create_model_version(name, &source, &model_uri.run_id)
        .await?;
    info!(
        "Created version '{}' of model '{}' from {}",
        version.version, name, model_uri
    );

    wait_until_ready(store, version, policy).await
}

async fn wait_until_ready(
    store: &dyn TrackingStore,
    mut version: ModelVersion,
    policy: &RegistrationPolicy,
) -> Result<ModelVersion> {
    let started = Instant::now();
    loop {
        match version.status {
            ModelVersionStatus::Ready => return Ok(version),
            ModelVersionStatus::FailedRegistration => {
                return Err(TrackingError::RegistrationFailed {
                    message: version.status_message.clone().unwrap_or_default(),
                    name: version.name,
                    version: version.version,
                })
            }
            ModelVersionStatus::PendingRegistration => {}
        }

        if started.elapsed() >= policy.timeout {
            return Err(TrackingError::RegistrationTimeout {
                name: version.name,
                version: version.version,
                waited_secs: started.elapsed().as_secs(),
            });
        }

        debug!(
            "Waiting for model version {}/{} to finish registration",
            version.name, version.version
        );
        tokio::time::sleep(policy.poll_interval).await;
        version = store
            .get_model_version(&version.name, &version.version)
            .await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_uri() {
        let uri: ModelUri = "runs:/abc123/model".parse().unwrap();
        assert_eq!(uri, ModelUri::new("abc123", "model"));
        assert_eq!(uri.to_string(), "runs:/abc123/model");

        let nested: ModelUri = "runs:/abc123/models/forest/".parse().unwrap();
        assert_eq!(nested.artifact_path, "models/forest");
    }

    #[test]
    fn test_reject_malformed_model_uri() {
        for bad in ["models:/iris/1", "runs:/abc123", "runs://model", "abc123/model"] {
            assert!(
                matches!(bad.parse::<ModelUri>(), Err(TrackingError::InvalidModelUri(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
