//! # Application Host
//!
//! This crate turns a declarative application manifest into a running set of
//! services.
//!
//! ## Philosophy
//!
//! - **Declare, then launch**: The manifest names services, references and waits
//! - **Registration errors are configuration errors**: Cycles never reach the launcher
//! - **Host owns I/O**: Services never print; the host renders the summary
//! - **Deterministic mode is first-class**: Simulated services drive the tests
//!
//! ## Responsibilities
//!
//! The host:
//! - Loads the TOML manifest (or the built-in products/store topology)
//! - Registers simulated services with their references and dependencies
//! - Runs the launcher and turns Ctrl-C into a shutdown
//! - Renders the run summary and maps it to an exit code

pub mod cli;
pub mod logging;
pub mod manifest;
pub mod runtime;
pub mod simulated;

pub use cli::Cli;
pub use logging::init_logging;
pub use manifest::{AppManifest, LauncherSettings, ManifestError, ServiceSpec};
pub use runtime::{render_summary, run_cli, AppHost, AppHostError, EXIT_CONFIG_ERROR};
pub use simulated::SimulatedService;
