//! Forestlog CLI
//!
//! ```text
//! forestlog run iris-basic
//! forestlog run legendary-total --tracking-uri ./mlruns
//! forestlog impostors
//! ```

use clap::Parser;
use forestlog::cli::{run_cli_mode, Args};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let code = run_cli_mode(args).await;
    std::process::exit(code);
}
