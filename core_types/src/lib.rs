//! # Core Types
//!
//! This crate defines the fundamental types shared by the apphost crates.
//!
//! ## Philosophy
//!
//! - **Names are validated once**: a [`ServiceName`] that exists is well formed.
//! - **Type safety first**: service names and run identifiers cannot be confused
//!   with arbitrary strings.
//!
//! ## Key Types
//!
//! - [`ServiceName`]: Unique, validated name of a registered service
//! - [`RunId`]: Unique identifier for a single launch run

pub mod ids;
pub mod service_name;

pub use ids::RunId;
pub use service_name::{ServiceName, ServiceNameError, MAX_SERVICE_NAME_LEN};
