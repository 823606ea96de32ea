//! # Application Host
//!
//! Main entry point for the application host.

use apphost::{init_logging, run_cli, Cli, EXIT_CONFIG_ERROR};
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Error: {}", e);
        process::exit(EXIT_CONFIG_ERROR);
    }

    let code = run_cli(&cli).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "application host failed");
        eprintln!("Error: {}", e);
        EXIT_CONFIG_ERROR
    });
    process::exit(code);
}
