//! Tracking client errors.

/// Errors produced by `forestlog-tracking`
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Tracking server returned HTTP {status} ({error_code}): {message}")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("Unsupported artifact URI: {0}")]
    UnsupportedArtifactUri(String),

    #[error("Invalid model URI '{0}', expected runs:/<run_id>/<artifact_path>")]
    InvalidModelUri(String),

    #[error("Unsupported tracking URI: {0}")]
    UnsupportedTrackingUri(String),

    #[error("Model version {name}/{version} still pending after {waited_secs}s")]
    RegistrationTimeout {
        name: String,
        version: String,
        waited_secs: u64,
    },

    #[error("Model version {name}/{version} failed registration: {message}")]
    RegistrationFailed {
        name: String,
        version: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TrackingError {
    fn from(e: serde_json::Error) -> Self {
        TrackingError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for TrackingError {
    fn from(e: serde_yaml::Error) -> Self {
        TrackingError::Serialization(e.to_string())
    }
}

/// Result type for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;
