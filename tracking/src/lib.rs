//! Forestlog Tracking
//!
//! Client side of an experiment-tracking service: experiments, runs,
//! params, metrics, artifacts, logged models and the model registry. Talks
//! to a remote server over its REST API or writes an `mlruns/`-style
//! directory locally.

pub mod artifacts;
pub mod client;
pub mod error;
pub mod file_store;
pub mod model;
pub mod registry;
pub mod rest;
pub mod run;
pub mod store;
pub mod types;

pub use client::{ClientOptions, TrackingClient};
pub use error::{Result, TrackingError};
pub use file_store::FileStore;
pub use model::{ColumnSpec, InputExample, ModelArtifact, ModelSignature};
pub use registry::{ModelUri, RegistrationPolicy};
pub use rest::RestStore;
pub use run::ActiveRun;
pub use store::{open_store, TrackingStore};
pub use types::{
    Experiment, Metric, ModelVersion, ModelVersionStatus, Param, RegisteredModel, RunInfo,
    RunStatus, RunTag,
};
