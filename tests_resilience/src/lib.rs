//! Resilience Test Utilities
//!
//! This crate provides shared utilities for launcher scenario tests.
//!
//! ## Test Philosophy
//!
//! - **Ordering under concurrency**: No service starts before its dependencies are ready
//! - **Deterministic timing**: Tests run on a paused tokio clock
//! - **Failures stay contained**: A failure reaches dependents, never unrelated services
//! - **Observable behaviour**: Every start and readiness report lands in an [`EventLog`]

use async_trait::async_trait;
use services_launcher::{Launcher, LauncherConfig};
use services_registry::{Service, ServiceRegistry, StartContext, StartError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use tokio::time::Instant;

/// Something a scripted service did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The start action was invoked
    Started(String),
    /// The service reported ready for the first time
    Ready(String),
}

/// Shared, ordered record of service events
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.events
            .lock()
            .expect("event log poisoned")
            .push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event log poisoned").clone()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|candidate| candidate == event)
    }

    pub fn was_started(&self, name: &str) -> bool {
        self.position(&Event::Started(name.to_string())).is_some()
    }

    /// Names of started services, in start order
    pub fn start_order(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Started(name) => Some(name),
                Event::Ready(_) => None,
            })
            .collect()
    }

    /// Checks that `dependency` reported ready before `dependent` was started
    pub fn ready_before_start(&self, dependency: &str, dependent: &str) -> bool {
        let ready = self.position(&Event::Ready(dependency.to_string()));
        let started = self.position(&Event::Started(dependent.to_string()));
        matches!((ready, started), (Some(ready), Some(started)) if ready < started)
    }
}

/// Test double whose start and readiness behaviour is scripted
pub struct ScriptedService {
    name: String,
    log: EventLog,
    start_delay: Duration,
    ready_after: Option<Duration>,
    start_error: Option<String>,
    barrier: Option<Arc<Barrier>>,
    started_at: Mutex<Option<Instant>>,
    ready_reported: AtomicBool,
    contexts: Mutex<Vec<StartContext>>,
}

impl ScriptedService {
    /// A service that starts instantly and is ready on the first probe
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            start_delay: Duration::ZERO,
            ready_after: Some(Duration::ZERO),
            start_error: None,
            barrier: None,
            started_at: Mutex::new(None),
            ready_reported: AtomicBool::new(false),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Makes the start action take `delay`
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Reports ready once `delay` has passed since the start action returned
    pub fn ready_after(mut self, delay: Duration) -> Self {
        self.ready_after = Some(delay);
        self
    }

    /// Never reports ready
    pub fn never_ready(mut self) -> Self {
        self.ready_after = None;
        self
    }

    /// Makes the start action fail with `message`
    pub fn failing_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    /// Makes the start action wait on `barrier` before returning
    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    /// Start contexts this service was started with
    pub fn contexts(&self) -> Vec<StartContext> {
        self.contexts.lock().expect("contexts poisoned").clone()
    }
}

#[async_trait]
impl Service for ScriptedService {
    async fn start(&self, context: &StartContext) -> Result<(), StartError> {
        self.log.record(Event::Started(self.name.clone()));
        self.contexts
            .lock()
            .expect("contexts poisoned")
            .push(context.clone());

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if let Some(message) = &self.start_error {
            return Err(StartError::new(message.clone()));
        }

        *self.started_at.lock().expect("start time poisoned") = Some(Instant::now());
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        let Some(ready_after) = self.ready_after else {
            return false;
        };
        let started_at = *self.started_at.lock().expect("start time poisoned");
        let ready = started_at.is_some_and(|at| at.elapsed() >= ready_after);

        if ready && !self.ready_reported.swap(true, Ordering::SeqCst) {
            self.log.record(Event::Ready(self.name.clone()));
        }
        ready
    }
}

/// Launcher settings used by scenario tests
///
/// Short timeouts keep paused-clock tests readable; the probe interval is
/// well below them.
pub fn test_config() -> LauncherConfig {
    LauncherConfig::default()
        .with_readiness_timeout(Duration::from_millis(500))
        .with_start_timeout(Duration::from_millis(500))
        .with_probe_interval(Duration::from_millis(10))
}

/// Bootstrap helper for tests
///
/// Registers the services in order, adds every `(dependent, dependency)`
/// edge and wraps the registry in a launcher using [`test_config`].
pub fn test_bootstrap(
    services: Vec<(&str, Arc<ScriptedService>)>,
    dependencies: &[(&str, &str)],
) -> Launcher {
    let mut registry = ServiceRegistry::new();
    for (name, service) in services {
        registry
            .register(name, service)
            .expect("Failed to register service");
    }
    for (dependent, dependency) in dependencies {
        registry
            .add_dependency(dependent, dependency)
            .expect("Failed to add dependency");
    }
    Launcher::new(registry, test_config()).expect("Failed to create launcher")
}
