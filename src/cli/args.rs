//! CLI argument parsing
//!
//! ```text
//! forestlog [global options] run <recipe> [--run-name NAME]
//! forestlog [global options] run --recipe-file recipe.toml
//! forestlog [global options] list
//! forestlog [global options] register --run-id ID --name NAME [--artifact-path model]
//! forestlog [global options] impostors [--model my_model.bin] [--recipe legendary-total]
//! ```

use clap::{Args as ClapArgs, Parser, Subcommand};
use forestlog_core::Settings;
use std::path::PathBuf;

/// Train random forests and record them on a tracking server
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "forestlog")]
#[command(version)]
#[command(about = "Train random forests from recipes and record runs on a tracking server")]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (TOML, JSON or YAML); defaults to ./forestlog.toml when present
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Tracking server URL, `file:` URI or local directory
    #[arg(long, global = true, value_name = "URI")]
    pub tracking_uri: Option<String>,

    /// Log filter, e.g. `info` or `forestlog=debug`
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Directory for confusion matrices and saved models
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train and record every run of a recipe
    Run(RunArgs),

    /// List the built-in recipes
    List,

    /// Register a logged model in the model registry
    Register(RegisterArgs),

    /// Show rows a saved model wrongly flags as the positive class
    Impostors(ImpostorsArgs),
}

/// Arguments for the run command
#[derive(ClapArgs, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Built-in recipe name
    #[arg(
        value_name = "RECIPE",
        required_unless_present = "recipe_file",
        conflicts_with = "recipe_file"
    )]
    pub recipe: Option<String>,

    /// Recipe read from a TOML file
    #[arg(long, value_name = "PATH")]
    pub recipe_file: Option<PathBuf>,

    /// Override the run name of a single-run recipe
    #[arg(long)]
    pub run_name: Option<String>,
}

/// Arguments for the register command
#[derive(ClapArgs, Debug, Clone, PartialEq)]
pub struct RegisterArgs {
    /// Run that logged the model
    #[arg(long)]
    pub run_id: String,

    /// Registered model name
    #[arg(long)]
    pub name: String,

    /// Artifact path the model was logged under
    #[arg(long, default_value = "model")]
    pub artifact_path: String,
}

/// Arguments for the impostors command
#[derive(ClapArgs, Debug, Clone, PartialEq)]
pub struct ImpostorsArgs {
    /// Saved model; defaults to the recipe's local save path in the output directory
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Recipe whose data and split the model was trained with
    #[arg(long, default_value = "legendary-total")]
    pub recipe: String,
}

/// Parse CLI arguments from any iterator (first item is the program name)
pub fn parse_args<I, T>(args: I) -> Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Args::try_parse_from(args)
}

/// Apply command-line overrides on top of file and environment settings
pub fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(uri) = &args.tracking_uri {
        settings.tracking.uri = uri.clone();
    }
    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }
    if args.json_logs {
        settings.logging.json = true;
    }
    if let Some(dir) = &args.output_dir {
        settings.output_dir = dir.clone();
    }
}
