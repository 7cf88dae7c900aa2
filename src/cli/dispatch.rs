//! Command dispatch
//!
//! Resolves settings, installs logging and runs one command. Every failure
//! is printed once and mapped to an exit code.

use super::{apply_overrides, Args, Command, Error, ImpostorsArgs, RegisterArgs, RunArgs};
use super::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use crate::logging::init_logging;
use crate::runner::{self, RecipeOutcome};
use anyhow::{Context, Result};
use forestlog_core::{ConfigManager, Recipe, Settings};
use forestlog_tracking::{ModelUri, TrackingError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Process exit code
pub type ExitCode = i32;

/// Run one command to completion
pub async fn run_cli_mode(args: Args) -> ExitCode {
    let (settings, config_path) = match resolve_settings(&args) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return exit_code_for(&e);
        }
    };

    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("Error: {}", Error::Logging(e.to_string()));
        return EXIT_CONFIG_ERROR;
    }
    if let Some(path) = config_path {
        debug!("Loaded settings from {}", path.display());
    }

    match dispatch(&args.command, &settings).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

/// Exit code for a failed command
///
/// Configuration mistakes and tracking service failures exit with 2, anything
/// else with 1.
pub fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    for cause in error.chain() {
        if cause.downcast_ref::<TrackingError>().is_some() {
            return EXIT_CONFIG_ERROR;
        }
        if let Some(core) = cause.downcast_ref::<forestlog_core::Error>() {
            if matches!(
                core,
                forestlog_core::Error::Config(_) | forestlog_core::Error::Recipe(_)
            ) {
                return EXIT_CONFIG_ERROR;
            }
        }
        if let Some(cli) = cause.downcast_ref::<Error>() {
            if matches!(cli, Error::UnknownRecipe(_) | Error::InvalidArgs(_)) {
                return EXIT_CONFIG_ERROR;
            }
        }
    }
    EXIT_FAILURE
}

/// Settings with command-line overrides applied, and the file they came from
fn resolve_settings(args: &Args) -> Result<(Settings, Option<PathBuf>)> {
    let manager = ConfigManager::load(args.config.as_deref())?;
    let config_path = manager.config_path().map(Path::to_path_buf);
    let mut settings = manager.into_settings();
    apply_overrides(&mut settings, args);
    Ok((settings, config_path))
}

async fn dispatch(command: &Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Run(run) => handle_run(run, settings).await,
        Command::List => {
            handle_list();
            Ok(())
        }
        Command::Register(register) => handle_register(register, settings).await,
        Command::Impostors(impostors) => handle_impostors(impostors, settings).await,
    }
}

/// Built-in recipe by name, or a recipe file
pub fn resolve_recipe(run: &RunArgs) -> Result<Recipe> {
    let mut recipe = match (&run.recipe, &run.recipe_file) {
        (_, Some(path)) => Recipe::from_toml_file(path)
            .with_context(|| format!("Failed to read recipe {}", path.display()))?,
        (Some(name), None) => {
            Recipe::preset(name).ok_or_else(|| Error::UnknownRecipe(name.clone()))?
        }
        (None, None) => {
            return Err(Error::InvalidArgs("a recipe name or --recipe-file is required".into()).into())
        }
    };

    if let Some(run_name) = &run.run_name {
        match recipe.runs.as_mut_slice() {
            [only] => only.run_name = run_name.clone(),
            runs => {
                return Err(Error::InvalidArgs(format!(
                    "--run-name needs a single-run recipe, '{}' has {} runs",
                    recipe.name,
                    runs.len()
                ))
                .into())
            }
        }
    }
    Ok(recipe)
}

async fn handle_run(run: &RunArgs, settings: &Settings) -> Result<()> {
    let recipe = resolve_recipe(run)?;
    let client = runner::connect(settings)?;
    let http = runner::http_client(settings)?;

    let outcome = runner::run_recipe(&recipe, &client, &http, settings).await?;
    print_summary(&outcome);
    Ok(())
}

fn print_summary(outcome: &RecipeOutcome) {
    println!(
        "Recipe '{}' finished in experiment {}",
        outcome.recipe, outcome.experiment_id
    );
    for run in &outcome.runs {
        let metrics = run
            .metrics
            .iter()
            .map(|(key, value)| format!("{}: {:.4}", capitalize(key), value))
            .collect::<Vec<_>>()
            .join(" | ");
        println!("{} ({}): {}", run.run_name, run.run_id, metrics);
        if let Some(uri) = &run.model_uri {
            println!("  model: {}", uri);
        }
        if let Some(version) = &run.model_version {
            println!(
                "  registered as {}, version {}",
                version.name, version.version
            );
        }
    }
    if let Some(path) = &outcome.saved_model {
        println!("Model saved locally to {}", path.display());
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn handle_list() {
    for recipe in Recipe::presets() {
        println!(
            "{:<18} {:<26} {} run(s)  {}",
            recipe.name,
            recipe.experiment,
            recipe.runs.len(),
            recipe.description
        );
    }
}

async fn handle_register(register: &RegisterArgs, settings: &Settings) -> Result<()> {
    let client = runner::connect(settings)?;
    let uri = ModelUri::new(register.run_id.as_str(), register.artifact_path.as_str());
    let version = client
        .register_model(&uri.to_string(), &register.name)
        .await
        .with_context(|| format!("Failed to register {} as '{}'", uri, register.name))?;
    println!(
        "Model registered as: {}, Version: {}",
        version.name, version.version
    );
    Ok(())
}

async fn handle_impostors(impostors: &ImpostorsArgs, settings: &Settings) -> Result<()> {
    let recipe = Recipe::preset(&impostors.recipe)
        .ok_or_else(|| Error::UnknownRecipe(impostors.recipe.clone()))?;
    let model_path = match (&impostors.model, &recipe.save_local) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => settings.output_dir.join(path),
        (None, None) => {
            return Err(Error::InvalidArgs(format!(
                "recipe '{}' saves no local model, pass --model",
                recipe.name
            ))
            .into())
        }
    };

    let http = runner::http_client(settings)?;
    let report = runner::detect_impostors(&recipe, &model_path, &http).await?;
    print!("{}", report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parse_args;

    fn run_args(argv: &[&str]) -> RunArgs {
        match parse_args(argv.iter().copied()).unwrap().command {
            Command::Run(run) => run,
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_resolve_preset_with_run_name() {
        let recipe = resolve_recipe(&run_args(&[
            "forestlog",
            "run",
            "legendary",
            "--run-name",
            "Legendary_Hunter_v3",
        ]))
        .unwrap();
        assert_eq!(recipe.runs.len(), 1);
        assert_eq!(recipe.runs[0].run_name, "Legendary_Hunter_v3");
    }

    #[test]
    fn test_run_name_rejected_for_grids() {
        let err = resolve_recipe(&run_args(&[
            "forestlog",
            "run",
            "iris-tuning",
            "--run-name",
            "x",
        ]))
        .unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_unknown_recipe_is_config_error() {
        let err = resolve_recipe(&run_args(&["forestlog", "run", "wine"])).unwrap_err();
        assert!(err.to_string().contains("Unknown recipe 'wine'"));
        assert_eq!(exit_code_for(&err), EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_exit_codes_follow_the_cause() {
        let tracking = anyhow::Error::new(TrackingError::NotFound("run abc".into()))
            .context("Failed to register");
        assert_eq!(exit_code_for(&tracking), EXIT_CONFIG_ERROR);

        let other = anyhow::anyhow!("model file is corrupt");
        assert_eq!(exit_code_for(&other), EXIT_FAILURE);
    }

    #[test]
    fn test_settings_remember_their_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forestlog.toml");
        std::fs::write(&path, "output_dir = \"artifacts\"\n\n[logging]\nlevel = \"warn\"\n").unwrap();

        let args = parse_args([
            "forestlog",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "debug",
            "list",
        ])
        .unwrap();
        let (settings, config_path) = resolve_settings(&args).unwrap();

        assert_eq!(config_path, Some(path));
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.output_dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_capitalize_metric_keys() {
        assert_eq!(capitalize("accuracy"), "Accuracy");
        assert_eq!(capitalize(""), "");
    }
}
