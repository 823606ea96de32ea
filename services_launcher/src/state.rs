//! Service lifecycle states and the shared state table

use core_types::ServiceName;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::warn;

/// Lifecycle states for a service
///
/// States only move forward. Ready and Failed are terminal: a launcher
/// never restarts a service on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Registered, not yet started
    Registered,
    /// Start action invoked, readiness not yet reported
    Starting,
    /// Service reported ready
    Ready,
    /// Service failed or was never started
    Failed,
}

impl ServiceState {
    /// Checks if the service is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Ready | ServiceState::Failed)
    }

    /// Checks whether moving to `next` is allowed
    pub fn can_transition_to(&self, next: ServiceState) -> bool {
        matches!(
            (self, next),
            (ServiceState::Registered, ServiceState::Starting)
                | (ServiceState::Registered, ServiceState::Failed)
                | (ServiceState::Starting, ServiceState::Ready)
                | (ServiceState::Starting, ServiceState::Failed)
        )
    }
}

/// Why a service ended up Failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceFailure {
    #[error("dependency '{dependency}' did not become ready within {timeout_ms}ms")]
    DependencyTimeout {
        dependency: ServiceName,
        timeout_ms: u64,
    },

    #[error("dependency '{dependency}' failed")]
    DependencyFailed { dependency: ServiceName },

    #[error("start action failed: {message}")]
    StartAction { message: String },

    #[error("start action did not complete within {timeout_ms}ms")]
    StartTimeout { timeout_ms: u64 },

    #[error("did not become ready within {timeout_ms}ms")]
    ReadinessTimeout { timeout_ms: u64 },

    #[error("readiness probe failed: {message}")]
    ReadinessProbe { message: String },

    #[error("cancelled: {reason}")]
    Cancelled { reason: String },
}

impl ServiceFailure {
    /// Failure reported to a dependent of a service that failed with `self`
    pub fn cascade_to_dependent(&self, dependency: ServiceName) -> ServiceFailure {
        match self {
            ServiceFailure::StartTimeout { timeout_ms }
            | ServiceFailure::ReadinessTimeout { timeout_ms } => {
                ServiceFailure::DependencyTimeout {
                    dependency,
                    timeout_ms: *timeout_ms,
                }
            }
            _ => ServiceFailure::DependencyFailed { dependency },
        }
    }
}

/// State of one service in the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceRecord {
    pub(crate) state: ServiceState,
    pub(crate) failure: Option<ServiceFailure>,
    starting_at: Option<Instant>,
    /// Time from Starting to Ready
    pub(crate) startup: Option<Duration>,
}

impl ServiceRecord {
    fn registered() -> Self {
        Self {
            state: ServiceState::Registered,
            failure: None,
            starting_at: None,
            startup: None,
        }
    }
}

/// Per-service states, indexed by registration index
///
/// All mutations go through [`StateTable::transition`], which serializes
/// them on the watch channel and wakes every task waiting on a receiver.
#[derive(Debug)]
pub(crate) struct StateTable {
    records: watch::Sender<Vec<ServiceRecord>>,
}

impl StateTable {
    pub(crate) fn new(len: usize) -> Self {
        let (records, _) = watch::channel(vec![ServiceRecord::registered(); len]);
        Self { records }
    }

    /// Adds Registered records for services registered since the last call
    pub(crate) fn ensure_len(&self, len: usize) {
        self.records.send_if_modified(|records| {
            if records.len() >= len {
                return false;
            }
            records.resize(len, ServiceRecord::registered());
            true
        });
    }

    pub(crate) fn state(&self, index: usize) -> Option<ServiceState> {
        self.records.borrow().get(index).map(|record| record.state)
    }

    pub(crate) fn snapshot(&self) -> Vec<ServiceRecord> {
        self.records.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Vec<ServiceRecord>> {
        self.records.subscribe()
    }

    pub(crate) fn mark_starting(&self, index: usize) -> bool {
        self.transition(index, ServiceState::Starting, None)
    }

    pub(crate) fn mark_ready(&self, index: usize) -> bool {
        self.transition(index, ServiceState::Ready, None)
    }

    pub(crate) fn mark_failed(&self, index: usize, failure: ServiceFailure) -> bool {
        self.transition(index, ServiceState::Failed, Some(failure))
    }

    /// Applies a transition if the state machine allows it
    ///
    /// Returns `false`, leaving the table untouched, for unknown indices and
    /// forbidden transitions.
    fn transition(&self, index: usize, next: ServiceState, failure: Option<ServiceFailure>) -> bool {
        let now = Instant::now();
        self.records.send_if_modified(|records| {
            let Some(record) = records.get_mut(index) else {
                return false;
            };
            if !record.state.can_transition_to(next) {
                warn!(
                    index,
                    from = ?record.state,
                    to = ?next,
                    "rejected service state transition"
                );
                return false;
            }

            match next {
                ServiceState::Starting => record.starting_at = Some(now),
                ServiceState::Ready => {
                    record.startup = record.starting_at.map(|at| now.duration_since(at));
                }
                ServiceState::Failed => record.failure = failure,
                ServiceState::Registered => {}
            }
            record.state = next;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_states() {
        assert!(ServiceState::Ready.is_terminal());
        assert!(ServiceState::Failed.is_terminal());
        assert!(!ServiceState::Registered.is_terminal());
        assert!(!ServiceState::Starting.is_terminal());
    }

    #[test]
    fn test_allowed_transitions() {
        use ServiceState::*;

        assert!(Registered.can_transition_to(Starting));
        assert!(Registered.can_transition_to(Failed));
        assert!(Starting.can_transition_to(Ready));
        assert!(Starting.can_transition_to(Failed));

        assert!(!Registered.can_transition_to(Ready));
        assert!(!Starting.can_transition_to(Registered));
        assert!(!Ready.can_transition_to(Failed));
        assert!(!Ready.can_transition_to(Starting));
        assert!(!Failed.can_transition_to(Starting));
        assert!(!Failed.can_transition_to(Ready));
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_string(&ServiceState::Ready).unwrap(), "\"ready\"");

        let failure = ServiceFailure::DependencyTimeout {
            dependency: ServiceName::new("products").unwrap(),
            timeout_ms: 500,
        };
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            serde_json::json!({
                "kind": "dependency_timeout",
                "dependency": "products",
                "timeout_ms": 500
            })
        );
    }

    #[test]
    fn test_cascade_mapping() {
        let products = ServiceName::new("products").unwrap();

        assert_eq!(
            ServiceFailure::ReadinessTimeout { timeout_ms: 50 }.cascade_to_dependent(products.clone()),
            ServiceFailure::DependencyTimeout {
                dependency: products.clone(),
                timeout_ms: 50
            }
        );
        assert_eq!(
            ServiceFailure::StartAction {
                message: "boom".to_string()
            }
            .cascade_to_dependent(products.clone()),
            ServiceFailure::DependencyFailed {
                dependency: products
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_table_transitions() {
        let table = StateTable::new(2);

        assert!(table.mark_starting(0));
        tokio::time::advance(Duration::from_millis(40)).await;
        assert!(table.mark_ready(0));
        assert!(!table.mark_failed(0, ServiceFailure::StartTimeout { timeout_ms: 1 }));

        let records = table.snapshot();
        assert_eq!(records[0].state, ServiceState::Ready);
        assert_eq!(records[0].startup, Some(Duration::from_millis(40)));
        assert_eq!(records[0].failure, None);

        assert!(!table.mark_ready(1));
        assert!(!table.mark_starting(7));
        assert_eq!(table.state(1), Some(ServiceState::Registered));
    }

    #[test]
    fn test_state_table_grows() {
        let table = StateTable::new(1);
        table.ensure_len(3);
        table.ensure_len(2);

        assert_eq!(table.snapshot().len(), 3);
        assert_eq!(table.state(2), Some(ServiceState::Registered));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let table = StateTable::new(1);
        let mut receiver = table.subscribe();

        table.mark_starting(0);
        let records = receiver
            .wait_for(|records| records[0].state == ServiceState::Starting)
            .await
            .unwrap();
        assert_eq!(records[0].state, ServiceState::Starting);
    }
}
