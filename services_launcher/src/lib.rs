//! # Service Launcher
//!
//! This crate starts the services of a [`ServiceRegistry`] in dependency
//! order.
//!
//! ## Philosophy
//!
//! Services are launched explicitly with clear lifecycle states.
//! Unlike framework-managed supervision, we focus on:
//! - Explicit state machine (Registered -> Starting -> Ready / Failed)
//! - Eager failure propagation (a failed dependency fails its dependents)
//! - Concurrency where the graph allows it (independent services start together)
//! - No hidden retries (re-running is the caller's decision)
//!
//! [`ServiceRegistry`]: services_registry::ServiceRegistry

pub mod config;
pub mod launcher;
pub mod state;
pub mod summary;

pub use config::LauncherConfig;
pub use launcher::{Launcher, LauncherError, ShutdownHandle};
pub use state::{ServiceFailure, ServiceState};
pub use summary::{RunSummary, ServiceOutcome};
