//! Service registry

use crate::descriptor::ServiceDescriptor;
use crate::graph::{Cycle, DependencyGraph};
use crate::service::{ResolvedReference, Service, StartContext};
use core_types::{ServiceName, ServiceNameError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error types for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Service name already registered: {0}")]
    DuplicateName(ServiceName),

    #[error("Service not found: {0}")]
    UnknownService(String),

    #[error("Dependency would create a cycle: {}", CyclePath(.path))]
    Cycle { path: Vec<ServiceName> },

    #[error("Service cannot reference itself: {0}")]
    SelfReference(ServiceName),

    #[error("Invalid service name: {0}")]
    InvalidName(#[from] ServiceNameError),
}

struct CyclePath<'a>(&'a [ServiceName]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, name) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", name)?;
        }
        Ok(())
    }
}

/// Service registry
///
/// Maintains the registered services in registration order, the acyclic
/// "waits for" graph between them and the non-ordering "references"
/// relation. Registration indices are stable for the life of the registry.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    /// Registered services, by registration index
    descriptors: Vec<ServiceDescriptor>,
    /// Name lookup table
    names: HashMap<ServiceName, usize>,
    /// Dependency edges
    graph: DependencyGraph,
    /// Referenced services, by registration index
    references: Vec<Vec<usize>>,
}

impl ServiceRegistry {
    /// Creates a new service registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service by name
    pub fn register(
        &mut self,
        name: &str,
        service: Arc<dyn Service>,
    ) -> Result<ServiceDescriptor, RegistryError> {
        let name = ServiceName::new(name)?;
        self.register_descriptor(ServiceDescriptor::new(name, service))
    }

    /// Registers a prepared descriptor
    pub fn register_descriptor(
        &mut self,
        descriptor: ServiceDescriptor,
    ) -> Result<ServiceDescriptor, RegistryError> {
        if self.names.contains_key(descriptor.name()) {
            return Err(RegistryError::DuplicateName(descriptor.name().clone()));
        }

        let index = self.graph.add_node();
        self.names.insert(descriptor.name().clone(), index);
        self.references.push(Vec::new());
        self.descriptors.push(descriptor.clone());
        Ok(descriptor)
    }

    /// Records that `dependent` must wait for `dependency` to be ready
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<(), RegistryError> {
        let dependent_index = self.index_of(dependent)?;
        let dependency_index = self.index_of(dependency)?;

        self.graph
            .add_edge(dependent_index, dependency_index)
            .map_err(|Cycle(path)| RegistryError::Cycle {
                path: path
                    .into_iter()
                    .map(|index| self.descriptors[index].name().clone())
                    .collect(),
            })?;
        Ok(())
    }

    /// Records that `dependent` is handed the endpoint of `referenced`
    ///
    /// References do not order startup; combine with
    /// [`add_dependency`](Self::add_dependency) to also wait.
    pub fn add_reference(&mut self, dependent: &str, referenced: &str) -> Result<(), RegistryError> {
        let dependent_index = self.index_of(dependent)?;
        let referenced_index = self.index_of(referenced)?;

        if dependent_index == referenced_index {
            return Err(RegistryError::SelfReference(
                self.descriptors[dependent_index].name().clone(),
            ));
        }

        let references = &mut self.references[dependent_index];
        if !references.contains(&referenced_index) {
            references.push(referenced_index);
        }
        Ok(())
    }

    /// Looks up a service by name
    pub fn descriptor(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.names.get(name).map(|&index| &self.descriptors[index])
    }

    /// Returns the registration index of a service
    pub fn index_of(&self, name: &str) -> Result<usize, RegistryError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))
    }

    /// Returns the descriptor at a registration index
    pub fn descriptor_at(&self, index: usize) -> Option<&ServiceDescriptor> {
        self.descriptors.get(index)
    }

    /// Lists all descriptors in registration order
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Direct dependencies of a service, in registration order
    pub fn dependencies_of(&self, name: &str) -> Result<Vec<&ServiceName>, RegistryError> {
        let index = self.index_of(name)?;
        Ok(self
            .graph
            .dependencies(index)
            .map(|dependency| self.descriptors[dependency].name())
            .collect())
    }

    /// Services referenced by `name`, in the order the references were added
    pub fn references_of(&self, name: &str) -> Result<Vec<&ServiceName>, RegistryError> {
        let index = self.index_of(name)?;
        Ok(self.references[index]
            .iter()
            .map(|&referenced| self.descriptors[referenced].name())
            .collect())
    }

    /// Builds the start context handed to the service at `index`
    pub fn start_context(&self, index: usize) -> Option<StartContext> {
        let descriptor = self.descriptors.get(index)?;
        let references = self.references[index]
            .iter()
            .map(|&referenced| {
                let target = &self.descriptors[referenced];
                ResolvedReference {
                    name: target.name().clone(),
                    endpoint: target.endpoint().map(str::to_string),
                }
            })
            .collect();
        Some(StartContext::new(descriptor.name().clone(), references))
    }

    /// The dependency graph over registration indices
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Registration indices in topological order, dependencies first
    pub fn topological_order(&self) -> Vec<usize> {
        self.graph.topological_order()
    }

    /// Returns the number of registered services
    pub fn count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
