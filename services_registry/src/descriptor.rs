//! Service descriptor

use crate::service::Service;
use core_types::ServiceName;
use std::fmt;
use std::sync::Arc;

/// Descriptor for a service
///
/// This specifies what to start and where dependents can reach it.
/// Dependencies are not stored here; they live in the registry's
/// [`DependencyGraph`](crate::DependencyGraph) so they can be validated
/// against every other registration.
#[derive(Clone)]
pub struct ServiceDescriptor {
    name: ServiceName,
    service: Arc<dyn Service>,
    endpoint: Option<String>,
}

impl ServiceDescriptor {
    /// Creates a new service descriptor
    pub fn new(name: ServiceName, service: Arc<dyn Service>) -> Self {
        Self {
            name,
            service,
            endpoint: None,
        }
    }

    /// Sets the endpoint handed to services referencing this one
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the startable handle
    pub fn service(&self) -> Arc<dyn Service> {
        Arc::clone(&self.service)
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
