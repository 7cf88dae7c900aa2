//! Artifact URI handling.
//!
//! A run's artifact root is either a local directory (`file:` URI or plain
//! path) written directly, or an `mlflow-artifacts:` URI served by the
//! tracking server's artifact proxy. Any other scheme is rejected.

use crate::error::{Result, TrackingError};
use reqwest::Url;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Local(PathBuf),
    /// Path below the server's `/api/2.0/mlflow-artifacts/artifacts/`
    Proxied(String),
}

/// Classify an artifact root URI
pub fn resolve(artifact_uri: &str) -> Result<ArtifactLocation> {
    let url = match parse_uri(artifact_uri) {
        None => return Ok(ArtifactLocation::Local(PathBuf::from(artifact_uri))),
        Some(url) => url,
    };
    match url.scheme() {
        "file" => Ok(ArtifactLocation::Local(file_path(&url)?)),
        // The authority is ignored; the server we talk to is the one proxying
        "mlflow-artifacts" => Ok(ArtifactLocation::Proxied(
            url.path().trim_matches('/').to_string(),
        )),
        _ => Err(TrackingError::UnsupportedArtifactUri(
            artifact_uri.to_string(),
        )),
    }
}

/// `root/relative` without doubling slashes
pub fn join(root: &str, relative: &str) -> String {
    let relative = relative.trim_matches('/');
    let root = root.trim_end_matches('/');
    match (root.is_empty(), relative.is_empty()) {
        (_, true) => root.to_string(),
        (true, false) => relative.to_string(),
        (false, false) => format!("{}/{}", root, relative),
    }
}

/// Reject empty, absolute and parent-escaping artifact paths
pub fn validate_relative(path: &str) -> Result<()> {
    let candidate = Path::new(path);
    let escapes = candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.trim().is_empty() || escapes {
        return Err(TrackingError::InvalidName(path.to_string()));
    }
    Ok(())
}

/// Write `contents` to `root/relative`, creating directories as needed
pub async fn write_local(root: &Path, relative: &str, contents: &[u8]) -> Result<PathBuf> {
    validate_relative(relative)?;
    let target = root.join(relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, contents).await?;
    debug!("Wrote artifact {} ({} bytes)", target.display(), contents.len());
    Ok(target)
}

/// `uri` as a URL, or `None` when it is a plain path. Single-letter schemes
/// are drive names.
pub(crate) fn parse_uri(uri: &str) -> Option<Url> {
    Url::parse(uri).ok().filter(|url| url.scheme().len() > 1)
}

/// Local path of a `file:` URL; only local hosts are accepted
pub(crate) fn file_path(url: &Url) -> Result<PathBuf> {
    url.to_file_path()
        .map_err(|_| TrackingError::UnsupportedArtifactUri(url.to_string()))
}
