//! Outcome of a launch

use crate::state::{ServiceFailure, ServiceState};
use core_types::ServiceName;
use serde::{Deserialize, Serialize};

/// Terminal state of one service after a launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOutcome {
    pub name: ServiceName,
    pub state: ServiceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ServiceFailure>,
    /// Milliseconds from Starting to Ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_ms: Option<u64>,
}

/// Per-service outcomes of a launch, in topological order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    services: Vec<ServiceOutcome>,
}

impl RunSummary {
    pub fn new(services: Vec<ServiceOutcome>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &[ServiceOutcome] {
        &self.services
    }

    pub fn outcome(&self, name: &str) -> Option<&ServiceOutcome> {
        self.services.iter().find(|outcome| outcome.name == name)
    }

    pub fn state_of(&self, name: &str) -> Option<ServiceState> {
        self.outcome(name).map(|outcome| outcome.state)
    }

    pub fn failure_of(&self, name: &str) -> Option<&ServiceFailure> {
        self.outcome(name).and_then(|outcome| outcome.failure.as_ref())
    }

    /// True when every service is Ready (vacuously true when empty)
    pub fn is_success(&self) -> bool {
        self.services
            .iter()
            .all(|outcome| outcome.state == ServiceState::Ready)
    }

    pub fn ready_count(&self) -> usize {
        self.count_in(ServiceState::Ready)
    }

    pub fn failed_count(&self) -> usize {
        self.count_in(ServiceState::Failed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ServiceOutcome> {
        self.services
            .iter()
            .filter(|outcome| outcome.state == ServiceState::Failed)
    }

    /// Process exit code: 0 when all services are Ready, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    fn count_in(&self, state: ServiceState) -> usize {
        self.services
            .iter()
            .filter(|outcome| outcome.state == state)
            .count()
    }
}
