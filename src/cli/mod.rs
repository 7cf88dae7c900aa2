//! CLI module
//!
//! Provides:
//! - Argument parsing (`run`, `list`, `register`, `impostors`)
//! - Settings resolution (defaults → config file → env → flags)
//! - Command dispatch and exit codes

pub mod args;
pub mod dispatch;

// Re-exports
pub use args::{apply_overrides, parse_args, Args, Command, ImpostorsArgs, RegisterArgs, RunArgs};
pub use dispatch::{exit_code_for, run_cli_mode, ExitCode};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown recipe '{0}'; `forestlog list` shows the built-in recipes")]
    UnknownRecipe(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Tracking service unreachable or rejecting requests, or bad configuration
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
