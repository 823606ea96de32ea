//! The contract a launchable service fulfils

use async_trait::async_trait;
use core_types::ServiceName;
use thiserror::Error;

/// A service the launcher can start
///
/// Implementations are supplied by the caller and are opaque to the
/// registry and launcher. `start` is invoked at most once per launch, and
/// only after every dependency reported ready. `is_ready` is polled
/// afterwards until it returns `true`.
#[async_trait]
pub trait Service: Send + Sync {
    /// Starts the service
    async fn start(&self, context: &StartContext) -> Result<(), StartError>;

    /// Reports whether the service can satisfy requests from dependents
    async fn is_ready(&self) -> bool;
}

/// Error returned by a failing start action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StartError {
    message: String,
}

impl StartError {
    /// Creates a start error with a human-readable message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A referenced service as seen by the service referencing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub name: ServiceName,
    pub endpoint: Option<String>,
}

/// Everything a start action is told about its surroundings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartContext {
    service: ServiceName,
    references: Vec<ResolvedReference>,
}

impl StartContext {
    /// Creates a start context
    pub fn new(service: ServiceName, references: Vec<ResolvedReference>) -> Self {
        Self {
            service,
            references,
        }
    }

    /// Name of the service being started
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Services this one references, in the order the references were added
    pub fn references(&self) -> &[ResolvedReference] {
        &self.references
    }

    /// Endpoint of a referenced service, if it has one
    pub fn endpoint_of(&self, name: &str) -> Option<&str> {
        self.references
            .iter()
            .find(|reference| reference.name == name)
            .and_then(|reference| reference.endpoint.as_deref())
    }

    /// Renders references as service-discovery variables
    ///
    /// Each referenced endpoint becomes `services__<name>__<scheme>__0`, with
    /// the scheme taken from the endpoint URL (`http` when it has none).
    /// References without an endpoint produce no variable.
    pub fn environment(&self) -> Vec<(String, String)> {
        self.references
            .iter()
            .filter_map(|reference| {
                let endpoint = reference.endpoint.as_ref()?;
                let scheme = endpoint
                    .split_once("://")
                    .map(|(scheme, _)| scheme)
                    .filter(|scheme| !scheme.is_empty())
                    .unwrap_or("http");
                Some((
                    format!("services__{}__{}__0", reference.name, scheme),
                    endpoint.clone(),
                ))
            })
            .collect()
    }
}
