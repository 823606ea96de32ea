//! Simulated services driven by manifest timings

use crate::manifest::ServiceSpec;
use async_trait::async_trait;
use services_registry::{Service, StartContext, StartError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Stand-in for a real service project
///
/// The start action sleeps for the configured startup delay; readiness turns
/// true once `ready_after` has passed since the start action returned.
#[derive(Debug)]
pub struct SimulatedService {
    name: String,
    startup_delay: Duration,
    ready_after: Option<Duration>,
    fail_on_start: bool,
    started_at: Mutex<Option<Instant>>,
}

impl SimulatedService {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            startup_delay: Duration::ZERO,
            ready_after: Some(Duration::ZERO),
            fail_on_start: false,
            started_at: Mutex::new(None),
        }
    }

    pub fn from_spec(spec: &ServiceSpec) -> Self {
        Self {
            startup_delay: Duration::from_millis(spec.startup_delay_ms),
            ready_after: (!spec.never_ready).then(|| Duration::from_millis(spec.ready_after_ms)),
            fail_on_start: spec.fail_on_start,
            ..Self::new(&spec.name)
        }
    }

    fn started_at(&self) -> Option<Instant> {
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Service for SimulatedService {
    async fn start(&self, context: &StartContext) -> Result<(), StartError> {
        for (variable, endpoint) in context.environment() {
            debug!(service = %self.name, %variable, %endpoint, "resolved reference");
        }

        tokio::time::sleep(self.startup_delay).await;
        if self.fail_on_start {
            return Err(StartError::new(format!("{} refused to start", self.name)));
        }

        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        match (self.started_at(), self.ready_after) {
            (Some(at), Some(ready_after)) => at.elapsed() >= ready_after,
            _ => false,
        }
    }
}
