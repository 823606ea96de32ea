//! # Service Registry
//!
//! This crate holds the registered services of an application host and the
//! dependencies between them.
//!
//! ## Philosophy
//!
//! Unlike a fluent builder that is validated when the application is built,
//! every registration here is validated eagerly:
//! - Duplicate names are rejected when registered
//! - Dependency edges are rejected when they would close a cycle
//! - A rejected call leaves the registry unchanged
//!
//! Services themselves are opaque: the registry only knows how to start them
//! and how to ask whether they are ready (see [`Service`]).

pub mod descriptor;
pub mod graph;
pub mod registry;
pub mod service;

pub use descriptor::ServiceDescriptor;
pub use graph::DependencyGraph;
pub use registry::{RegistryError, ServiceRegistry};
pub use service::{ResolvedReference, Service, StartContext, StartError};
