//! Failure Cascade Tests
//!
//! Validates that runtime failures are reported per service, reach every
//! transitive dependent, and leave already-ready services alone.

use core_types::ServiceName;
use services_launcher::{ServiceFailure, ServiceState};
use std::sync::Arc;
use std::time::Duration;
use tests_resilience::{test_bootstrap, EventLog, ScriptedService};

fn name(value: &str) -> ServiceName {
    ServiceName::new(value).unwrap()
}

/// Test: products never becomes ready
///
/// This validates that:
/// 1. products fails its own readiness timeout
/// 2. store fails with a dependency timeout naming products
/// 3. store's start action is never invoked
#[tokio::test(start_paused = true)]
async fn test_dependency_timeout_blocks_store() {
    let log = EventLog::new();
    let products = Arc::new(ScriptedService::new("products", &log).never_ready());
    let store = Arc::new(ScriptedService::new("store", &log));

    let mut launcher = test_bootstrap(
        vec![("products", products), ("store", store)],
        &[("store", "products")],
    );
    let summary = launcher.run().await;

    assert_eq!(
        summary.failure_of("products"),
        Some(&ServiceFailure::ReadinessTimeout { timeout_ms: 500 })
    );
    assert_eq!(summary.state_of("store"), Some(ServiceState::Failed));
    assert_eq!(
        summary.failure_of("store"),
        Some(&ServiceFailure::DependencyTimeout {
            dependency: name("products"),
            timeout_ms: 500
        })
    );
    assert!(!log.was_started("store"));
    assert_eq!(summary.exit_code(), 1);
}

/// Test: a failed start action fails every transitive dependent
#[tokio::test(start_paused = true)]
async fn test_start_failure_reaches_transitive_dependents() {
    let log = EventLog::new();
    let service = |name: &str| Arc::new(ScriptedService::new(name, &log));
    let products = Arc::new(ScriptedService::new("products", &log).failing_start("database unreachable"));

    let mut launcher = test_bootstrap(
        vec![
            ("products", products),
            ("store", service("store")),
            ("web", service("web")),
            ("worker", service("worker")),
        ],
        &[("store", "products"), ("web", "store")],
    );
    let summary = launcher.run().await;

    assert_eq!(
        summary.failure_of("products"),
        Some(&ServiceFailure::StartAction {
            message: "database unreachable".to_string()
        })
    );
    assert_eq!(
        summary.failure_of("store"),
        Some(&ServiceFailure::DependencyFailed {
            dependency: name("products")
        })
    );
    assert_eq!(
        summary.failure_of("web"),
        Some(&ServiceFailure::DependencyFailed {
            dependency: name("store")
        })
    );
    assert!(!log.was_started("store"));
    assert!(!log.was_started("web"));

    // unrelated services are unaffected
    assert_eq!(summary.state_of("worker"), Some(ServiceState::Ready));
    assert_eq!(summary.failed_count(), 3);
}

/// Test: a slow start action is abandoned after the start timeout
#[tokio::test(start_paused = true)]
async fn test_start_timeout() {
    let log = EventLog::new();
    let products = Arc::new(
        ScriptedService::new("products", &log).with_start_delay(Duration::from_secs(10)),
    );
    let store = Arc::new(ScriptedService::new("store", &log));

    let mut launcher = test_bootstrap(
        vec![("products", products), ("store", store)],
        &[("store", "products")],
    );
    let summary = launcher.run().await;

    assert_eq!(
        summary.failure_of("products"),
        Some(&ServiceFailure::StartTimeout { timeout_ms: 500 })
    );
    assert_eq!(
        summary.failure_of("store"),
        Some(&ServiceFailure::DependencyTimeout {
            dependency: name("products"),
            timeout_ms: 500
        })
    );
}

/// Test: a later failure does not roll back services that are already ready
#[tokio::test(start_paused = true)]
async fn test_no_rollback_of_ready_services() {
    let log = EventLog::new();
    let products = Arc::new(ScriptedService::new("products", &log));
    let store = Arc::new(ScriptedService::new("store", &log).failing_start("bad config"));

    let mut launcher = test_bootstrap(
        vec![("products", products), ("store", store)],
        &[("store", "products")],
    );
    let summary = launcher.run().await;

    assert_eq!(summary.state_of("products"), Some(ServiceState::Ready));
    assert_eq!(summary.state_of("store"), Some(ServiceState::Failed));
    assert_eq!(launcher.state("products"), Some(ServiceState::Ready));

    // failed services are terminal: running again does not retry them
    let again = launcher.run().await;
    assert_eq!(again, summary);
    assert_eq!(log.start_order(), vec!["products", "store"]);
}
