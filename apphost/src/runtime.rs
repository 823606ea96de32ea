//! # Host Runtime
//!
//! Loads the manifest, launches the services and reports the outcome.

use crate::cli::Cli;
use crate::manifest::{AppManifest, LauncherSettings, ManifestError};
use lifecycle::CancellationReason;
use services_launcher::{Launcher, LauncherError, RunSummary, ServiceState, ShutdownHandle};
use thiserror::Error;
use tracing::{info, warn};

/// Exit code for manifest and configuration errors
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Host runtime error types
#[derive(Debug, Error)]
pub enum AppHostError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Launcher error: {0}")]
    Launcher(#[from] LauncherError),

    #[error("Invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to install logger: {0}")]
    Logging(String),

    #[error("Failed to render summary: {0}")]
    Render(#[from] serde_json::Error),
}

/// A launcher built from a manifest
pub struct AppHost {
    launcher: Launcher,
}

impl AppHost {
    /// Creates a host runtime; `overrides` replace manifest launcher settings
    pub fn new(manifest: &AppManifest, overrides: LauncherSettings) -> Result<Self, AppHostError> {
        let launcher = manifest.build_launcher(overrides)?;
        info!(
            services = launcher.registry().count(),
            "application manifest registered"
        );
        Ok(Self { launcher })
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.launcher.shutdown_handle()
    }

    /// Runs the launcher until every service is Ready or Failed
    ///
    /// Ctrl-C shuts the launch down.
    pub async fn run(&mut self) -> RunSummary {
        let handle = self.shutdown_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, shutting down");
                handle.cancel(CancellationReason::UserCancel);
            }
        });

        let summary = self.launcher.run().await;
        interrupt.abort();
        summary
    }
}

/// Loads the manifest named on the command line and runs it
///
/// Prints the rendered summary to stdout and returns the exit code.
pub async fn run_cli(cli: &Cli) -> Result<i32, AppHostError> {
    let manifest = match &cli.manifest {
        Some(path) => AppManifest::from_path(path)?,
        None => AppManifest::products_and_store(),
    };

    let mut host = AppHost::new(&manifest, cli.launcher_overrides())?;
    let summary = host.run().await;
    println!("{}", render_summary(&summary, cli.json)?);
    Ok(summary.exit_code())
}

/// Renders a summary as a table, or as JSON when `json` is set
pub fn render_summary(summary: &RunSummary, json: bool) -> Result<String, AppHostError> {
    if json {
        return Ok(serde_json::to_string_pretty(summary)?);
    }

    let width = summary
        .services()
        .iter()
        .map(|outcome| outcome.name.as_str().len())
        .max()
        .unwrap_or(0)
        .max("SERVICE".len());

    let mut out = format!("{:<width$}  {:<8}  DETAIL\n", "SERVICE", "STATE");
    for outcome in summary.services() {
        let detail = match (&outcome.failure, outcome.startup_ms) {
            (Some(failure), _) => failure.to_string(),
            (None, Some(ms)) => format!("ready after {}ms", ms),
            (None, None) => String::new(),
        };
        let state = match outcome.state {
            ServiceState::Registered => "pending",
            ServiceState::Starting => "starting",
            ServiceState::Ready => "ready",
            ServiceState::Failed => "failed",
        };
        out.push_str(&format!(
            "{:<width$}  {:<8}  {}\n",
            outcome.name.as_str(),
            state,
            detail
        ));
    }
    out.push_str(&format!(
        "{} ready, {} failed",
        summary.ready_count(),
        summary.failed_count()
    ));
    Ok(out)
}
