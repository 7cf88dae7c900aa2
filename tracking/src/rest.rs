//! REST API 2.0 client for a remote tracking server.

use crate::artifacts::{self, ArtifactLocation};
use crate::error::{Result, TrackingError};
use crate::store::TrackingStore;
use crate::types::{
    Experiment, Metric, ModelVersion, Param, RegisteredModel, RunInfo, RunStatus, RunTag,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACTS_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";

/// Tracking store backed by a server's REST API
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ExperimentResponse {
    experiment: Experiment,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct RunResponse {
    run: RunBody,
}

#[derive(Deserialize)]
struct RunBody {
    info: RunInfo,
}

#[derive(Deserialize)]
struct UpdateRunResponse {
    run_info: RunInfo,
}

#[derive(Deserialize)]
struct RegisteredModelResponse {
    registered_model: RegisteredModel,
}

#[derive(Deserialize)]
struct ModelVersionResponse {
    model_version: ModelVersion,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Serialize)]
struct LogBatchRequest<'a> {
    run_id: &'a str,
    metrics: &'a [Metric],
    params: &'a [Param],
    tags: &'a [RunTag],
}

impl RestStore {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| TrackingError::Http {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| TrackingError::Http {
                url: url.clone(),
                source,
            })?;
        decode(&url, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| TrackingError::Http {
                url: url.clone(),
                source,
            })?;
        decode(&url, response).await
    }
}

/// Turn a response into `T`, or into the error its body describes
async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await.map_err(|source| TrackingError::Http {
        url: url.to_string(),
        source,
    })?;

    if !status.is_success() {
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = if body.message.is_empty() {
            text
        } else {
            body.message
        };
        return Err(match body.error_code.as_str() {
            "RESOURCE_ALREADY_EXISTS" => TrackingError::AlreadyExists(message),
            "RESOURCE_DOES_NOT_EXIST" => TrackingError::NotFound(message),
            _ => TrackingError::Api {
                status: status.as_u16(),
                error_code: body.error_code,
                message,
            },
        });
    }

    let text = if text.trim().is_empty() { "{}" } else { &text };
    Ok(serde_json::from_str(text)?)
}

#[async_trait]
impl TrackingStore for RestStore {
    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        match self
            .get::<ExperimentResponse>("experiments/get-by-name", &[("experiment_name", name)])
            .await
        {
            Ok(response) => Ok(Some(response.experiment)),
            Err(TrackingError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_experiment(&self, name: &str) -> Result<String> {
        let response: CreateExperimentResponse =
            self.post("experiments/create", &json!({ "name": name })).await?;
        Ok(response.experiment_id)
    }

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
        start_time: i64,
        tags: &[RunTag],
    ) -> Result<RunInfo> {
        let response: RunResponse = self
            .post(
                "runs/create",
                &json!({
                    "experiment_id": experiment_id,
                    "run_name": run_name,
                    "start_time": start_time,
                    "tags": tags,
                }),
            )
            .await?;
        Ok(response.run.info)
    }

    async fn get_run(&self, run_id: &str) -> Result<RunInfo> {
        let response: RunResponse = self.get("runs/get", &[("run_id", run_id)]).await?;
        Ok(response.run.info)
    }

    async fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()> {
        let _: Empty = self
            .post(
                "runs/log-batch",
                &LogBatchRequest {
                    run_id,
                    metrics,
                    params,
                    tags,
                },
            )
            .await?;
        Ok(())
    }

    async fn set_tag(&self, run_id: &str, tag: &RunTag) -> Result<()> {
        let _: Empty = self
            .post(
                "runs/set-tag",
                &json!({ "run_id": run_id, "key": tag.key, "value": tag.value }),
            )
            .await?;
        Ok(())
    }

    async fn update_run(&self, run_id: &str, status: RunStatus, end_time: i64) -> Result<RunInfo> {
        let response: UpdateRunResponse = self
            .post(
                "runs/update",
                &json!({ "run_id": run_id, "status": status, "end_time": end_time }),
            )
            .await?;
        Ok(response.run_info)
    }

    async fn upload_artifact(
        &self,
        artifact_uri: &str,
        relative_path: &str,
        contents: Vec<u8>,
    ) -> Result<()> {
        artifacts::validate_relative(relative_path)?;
        match artifacts::resolve(artifact_uri)? {
            ArtifactLocation::Local(root) => {
                artifacts::write_local(&root, relative_path, &contents).await?;
                Ok(())
            }
            ArtifactLocation::Proxied(root) => {
                let url = format!(
                    "{}/{}",
                    self.base_url,
                    artifacts::join(ARTIFACTS_PREFIX, &artifacts::join(&root, relative_path))
                );
                debug!("PUT {} ({} bytes)", url, contents.len());
                let response = self
                    .client
                    .put(&url)
                    .body(contents)
                    .send()
                    .await
                    .map_err(|source| TrackingError::Http {
                        url: url.clone(),
                        source,
                    })?;
                let _: Empty = decode(&url, response).await?;
                Ok(())
            }
        }
    }

    async fn create_registered_model(&self, name: &str) -> Result<RegisteredModel> {
        let response: RegisteredModelResponse = self
            .post("registered-models/create", &json!({ "name": name }))
            .await?;
        Ok(response.registered_model)
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion> {
        let response: ModelVersionResponse = self
            .post(
                "model-versions/create",
                &json!({ "name": name, "source": source, "run_id": run_id }),
            )
            .await?;
        Ok(response.model_version)
    }

    async fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion> {
        let response: ModelVersionResponse = self
            .get(
                "model-versions/get",
                &[("name", name), ("version", version)],
            )
            .await?;
        Ok(response.model_version)
    }

    fn uri(&self) -> &str {
        &self.base_url
    }
}
