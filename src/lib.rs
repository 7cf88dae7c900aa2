//! Forestlog: random forest training recipes recorded on a tracking server
//!
//! The binary resolves settings, picks a recipe and hands it to the
//! [`runner`], which trains with `forestlog-core` and records runs through
//! `forestlog-tracking`.

pub mod cli;
pub mod logging;
pub mod runner;

pub use runner::{detect_impostors, run_recipe, RecipeOutcome, RunOutcome};
