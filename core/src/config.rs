//! Configuration Management Module
//!
//! Settings are layered: built-in defaults, then an optional configuration
//! file (TOML, JSON or YAML), then environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration file format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    Json,
    #[default]
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from a file extension, defaulting to TOML
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            None => Ok(ConfigFormat::Toml),
            Some(ext) => ext.parse(),
        }
    }
}

impl std::str::FromStr for ConfigFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(Error::Config(format!("Unsupported config format: {}", s))),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tracking service connection
    pub tracking: TrackingSettings,
    /// Log output
    pub logging: LoggingSettings,
    /// Directory for local files (confusion matrix images, saved models)
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tracking: TrackingSettings::default(),
            logging: LoggingSettings::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Tracking service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// `http(s)://` server address, `file:` URI or plain directory
    pub uri: String,
    pub request_timeout_seconds: u64,
    /// Upper bound on waiting for a model version to become ready
    pub registration_timeout_seconds: u64,
    pub registration_poll_millis: u64,
    /// Recorded as the run's user; falls back to `$USER`
    pub user: Option<String>,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            uri: "http://localhost:5000".to_string(),
            request_timeout_seconds: 30,
            registration_timeout_seconds: 300,
            registration_poll_millis: 1000,
            user: None,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration manager
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: Option<PathBuf>,
    settings: Settings,
}

impl ConfigManager {
    /// File picked up from the working directory when no path is given
    pub const DEFAULT_FILE: &'static str = "forestlog.toml";

    /// Load settings from `path`, or from [`Self::DEFAULT_FILE`] when present.
    ///
    /// An explicitly requested file must exist. Environment overrides are
    /// applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => {
                let default = PathBuf::from(Self::DEFAULT_FILE);
                default.exists().then_some(default)
            }
        };

        let settings = match &config_path {
            Some(path) => Self::read_file(path)?,
            None => Settings::default(),
        };

        let mut manager = Self {
            config_path,
            settings,
        };
        manager.apply_env_overrides();
        Ok(manager)
    }

    /// Build a manager around already constructed settings
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            config_path: None,
            settings,
        }
    }

    fn read_file(path: &Path) -> Result<Settings> {
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let settings = Self::parse(&content, format)?;
        info!("Loaded configuration from {}", path.display());
        Ok(settings)
    }

    /// Parse settings text in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Settings> {
        match format {
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e))),
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e))),
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e))),
        }
    }

    /// Write the current settings, format chosen by extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(&self.settings)
                .map_err(|e| Error::Config(format!("Failed to serialize TOML config: {}", e)))?,
            ConfigFormat::Json => serde_json::to_string_pretty(&self.settings)
                .map_err(|e| Error::Config(format!("Failed to serialize JSON config: {}", e)))?,
            ConfigFormat::Yaml => serde_yaml::to_string(&self.settings)
                .map_err(|e| Error::Config(format!("Failed to serialize YAML config: {}", e)))?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // MLFLOW_TRACKING_URI first so the forestlog-specific variable wins
        for key in ["MLFLOW_TRACKING_URI", "FORESTLOG_TRACKING_URI"] {
            if let Some(uri) = lookup(key) {
                self.settings.tracking.uri = uri;
                debug!("Applied env override {}", key);
            }
        }

        if let Some(level) = lookup("FORESTLOG_LOG_LEVEL") {
            self.settings.logging.level = level;
            debug!("Applied env override for log level");
        }

        if let Some(json) = lookup("FORESTLOG_LOG_JSON") {
            self.settings.logging.json = matches!(json.to_lowercase().as_str(), "1" | "true");
            debug!("Applied env override for JSON logs");
        }

        if let Some(dir) = lookup("FORESTLOG_OUTPUT_DIR") {
            self.settings.output_dir = PathBuf::from(dir);
            debug!("Applied env override for output directory");
        }

        if let Some(user) = lookup("FORESTLOG_USER") {
            self.settings.tracking.user = Some(user);
            debug!("Applied env override for tracking user");
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Path the settings were read from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_point_at_local_server() {
        let settings = Settings::default();
        assert_eq!(settings.tracking.uri, "http://localhost:5000");
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = ConfigManager::parse(
            r#"
            output_dir = "out"

            [tracking]
            uri = "http://mlflow.internal:5000"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(settings.tracking.uri, "http://mlflow.internal:5000");
        assert_eq!(settings.tracking.request_timeout_seconds, 30);
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn test_json_and_yaml_formats() {
        let json = ConfigManager::parse(r#"{"logging": {"level": "debug"}}"#, ConfigFormat::Json)
            .unwrap();
        assert_eq!(json.logging.level, "debug");

        let yaml = ConfigManager::parse("logging:\n  json: true\n", ConfigFormat::Yaml).unwrap();
        assert!(yaml.logging.json);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/forestlog.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("forestlog")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("forestlog.ini")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MLFLOW_TRACKING_URI", "http://ignored:5000"),
            ("FORESTLOG_TRACKING_URI", "file:./mlruns"),
            ("FORESTLOG_LOG_JSON", "TRUE"),
            ("FORESTLOG_USER", "trainer"),
        ]
        .into_iter()
        .collect();

        let mut manager = ConfigManager::from_settings(Settings::default());
        manager.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        let settings = manager.settings();
        assert_eq!(settings.tracking.uri, "file:./mlruns");
        assert!(settings.logging.json);
        assert_eq!(settings.tracking.user.as_deref(), Some("trainer"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(ConfigManager::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("forestlog.json");

        let mut manager = ConfigManager::from_settings(Settings::default());
        manager.settings_mut().tracking.registration_timeout_seconds = 5;
        manager.save(&path).unwrap();

        let loaded = ConfigManager::read_file(&path).unwrap();
        assert_eq!(loaded.tracking.registration_timeout_seconds, 5);
    }
}
