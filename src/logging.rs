//! Logging setup
//!
//! `RUST_LOG` wins over the configured level. Logs go to stderr so reports
//! printed on stdout stay clean.

use anyhow::Result;
use forestlog_core::config::LoggingSettings;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter for `level` unless `RUST_LOG` is set
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Install the global subscriber
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = build_filter(&settings.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    if settings.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_directives() {
        assert!(build_filter("info").is_ok());
        assert!(build_filter("forestlog=debug,warn").is_ok());
    }
}
