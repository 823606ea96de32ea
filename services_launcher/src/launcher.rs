//! Launcher runtime: starts registered services in dependency order.

use crate::config::LauncherConfig;
use crate::state::{ServiceFailure, ServiceRecord, ServiceState, StateTable};
use crate::summary::{RunSummary, ServiceOutcome};
use core_types::{RunId, ServiceName};
use lifecycle::{
    run_cancellable, run_until, CancellationReason, CancellationSource, CancellationToken,
    LifecycleError, Timeout,
};
use services_registry::{RegistryError, Service, ServiceDescriptor, ServiceRegistry, StartContext};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, trace, warn, Instrument, Span};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LauncherError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid launcher configuration: {0}")]
    InvalidConfig(String),

    #[error("Service already launched: {0}")]
    AlreadyLaunched(ServiceName),
}

/// Cloneable handle that shuts a launcher down from another task
///
/// Shutting down fails every service that is still waiting or Starting with
/// [`ServiceFailure::Cancelled`] instead of waiting for its timeouts. A
/// launcher that was shut down stays shut down.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    source: CancellationSource,
}

impl ShutdownHandle {
    /// Requests shutdown; returns `false` if it was already requested
    pub fn shutdown(&self) -> bool {
        self.cancel(CancellationReason::SupervisorCancel)
    }

    /// Requests shutdown with a specific reason
    pub fn cancel(&self, reason: CancellationReason) -> bool {
        let requested = self.source.cancel(reason.clone());
        if requested {
            info!(%reason, "launcher shutdown requested");
        }
        requested
    }

    pub fn is_shutdown(&self) -> bool {
        self.source.is_cancelled()
    }
}

/// Starts the services of a registry, respecting their dependencies
///
/// Owns the registry, so registrations and launches cannot interleave. Every
/// service still Registered when [`run`](Launcher::run) is called gets its
/// own task; tasks wait on the shared state table for their dependencies.
pub struct Launcher {
    registry: ServiceRegistry,
    config: LauncherConfig,
    states: Arc<StateTable>,
    shutdown: CancellationSource,
}

impl Launcher {
    pub fn new(registry: ServiceRegistry, config: LauncherConfig) -> Result<Self, LauncherError> {
        config.validate()?;
        let states = Arc::new(StateTable::new(registry.count()));
        Ok(Self {
            registry,
            config,
            states,
            shutdown: CancellationSource::new(),
        })
    }

    /// Registers another service; it starts on the next [`run`](Self::run)
    pub fn register(
        &mut self,
        name: &str,
        service: Arc<dyn Service>,
    ) -> Result<ServiceDescriptor, LauncherError> {
        let descriptor = self.registry.register(name, service)?;
        self.states.ensure_len(self.registry.count());
        Ok(descriptor)
    }

    pub fn register_descriptor(
        &mut self,
        descriptor: ServiceDescriptor,
    ) -> Result<ServiceDescriptor, LauncherError> {
        let descriptor = self.registry.register_descriptor(descriptor)?;
        self.states.ensure_len(self.registry.count());
        Ok(descriptor)
    }

    /// Records that `dependent` waits for `dependency`
    ///
    /// Fails with [`LauncherError::AlreadyLaunched`] once `dependent` has left
    /// the Registered state, since it can no longer wait.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> Result<(), LauncherError> {
        self.ensure_not_launched(dependent)?;
        self.registry.add_dependency(dependent, dependency)?;
        Ok(())
    }

    /// Records that `dependent` is handed the endpoint of `referenced`
    pub fn add_reference(&mut self, dependent: &str, referenced: &str) -> Result<(), LauncherError> {
        self.ensure_not_launched(dependent)?;
        self.registry.add_reference(dependent, referenced)?;
        Ok(())
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Current state of a service
    pub fn state(&self, name: &str) -> Option<ServiceState> {
        let index = self.registry.index_of(name).ok()?;
        self.states.state(index)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            source: self.shutdown.clone(),
        }
    }

    /// Shuts the launcher down; see [`ShutdownHandle`]
    pub fn shutdown(&self) -> bool {
        self.shutdown_handle().shutdown()
    }

    /// Per-service states as they are now, in topological order
    pub fn summary(&self) -> RunSummary {
        let records = self.states.snapshot();
        let services = self
            .registry
            .topological_order()
            .into_iter()
            .filter_map(|index| {
                let descriptor = self.registry.descriptor_at(index)?;
                let record = records.get(index)?;
                Some(ServiceOutcome {
                    name: descriptor.name().clone(),
                    state: record.state,
                    failure: record.failure.clone(),
                    startup_ms: record
                        .startup
                        .map(|startup| u64::try_from(startup.as_millis()).unwrap_or(u64::MAX)),
                })
            })
            .collect();
        RunSummary::new(services)
    }

    /// Starts every Registered service and waits until all are Ready or Failed
    ///
    /// Services that reached a terminal state in an earlier run are left
    /// alone, so running an all-Ready launcher again returns the same
    /// summary without touching any service.
    pub async fn run(&mut self) -> RunSummary {
        self.states.ensure_len(self.registry.count());

        let pending: Vec<usize> = self
            .registry
            .topological_order()
            .into_iter()
            .filter(|&index| self.states.state(index) == Some(ServiceState::Registered))
            .collect();

        if pending.is_empty() {
            debug!("no registered services left to start");
            return self.summary();
        }

        let run_id = RunId::new();
        let span = info_span!("launch", run = %run_id);
        info!(parent: &span, services = pending.len(), "launching services");

        // Dropping the set aborts every service task, so a dropped run leaves
        // nothing behind.
        let mut tasks = JoinSet::new();
        let mut running: HashMap<task::Id, Supervised> = HashMap::new();
        for index in pending {
            if let Some(task) = self.task_for(index) {
                let supervised = Supervised {
                    index,
                    name: task.name.clone(),
                    start_returned: Arc::clone(&task.start_returned),
                };
                let handle = tasks.spawn(task.drive().instrument(span.clone()));
                running.insert(handle.id(), supervised);
            }
        }
        while let Some(joined) = tasks.join_next_with_id().await {
            if let Err(err) = joined {
                match running.get(&err.id()) {
                    Some(supervised) => self.record_abnormal_exit(supervised, &err, &span),
                    None => error!(parent: &span, error = %err, "unknown service task failed"),
                }
            }
        }

        let summary = self.summary();
        info!(
            parent: &span,
            ready = summary.ready_count(),
            failed = summary.failed_count(),
            "launch finished"
        );
        summary
    }

    fn ensure_not_launched(&self, name: &str) -> Result<(), LauncherError> {
        let index = self.registry.index_of(name)?;
        match self.states.state(index) {
            Some(ServiceState::Registered) | None => Ok(()),
            Some(_) => Err(LauncherError::AlreadyLaunched(
                self.registry.descriptors()[index].name().clone(),
            )),
        }
    }

    /// Fails a service whose task panicked or was aborted
    fn record_abnormal_exit(&self, supervised: &Supervised, err: &JoinError, span: &Span) {
        let failure = if !err.is_panic() {
            ServiceFailure::StartAction {
                message: err.to_string(),
            }
        } else if supervised.start_returned.load(Ordering::SeqCst) {
            ServiceFailure::ReadinessProbe {
                message: "readiness probe panicked".to_string(),
            }
        } else {
            ServiceFailure::StartAction {
                message: "start action panicked".to_string(),
            }
        };
        if self.states.mark_failed(supervised.index, failure.clone()) {
            error!(parent: span, service = %supervised.name, error = %failure, "service task aborted");
        }
    }

    fn task_for(&self, index: usize) -> Option<ServiceTask> {
        let descriptor = self.registry.descriptor_at(index)?;
        let context = self.registry.start_context(index)?;
        let dependencies = self
            .registry
            .graph()
            .dependencies(index)
            .filter_map(|dependency| {
                let name = self.registry.descriptor_at(dependency)?.name().clone();
                Some((dependency, name))
            })
            .collect();

        Some(ServiceTask {
            index,
            name: descriptor.name().clone(),
            service: descriptor.service(),
            context,
            dependencies,
            states: Arc::clone(&self.states),
            config: self.config,
            token: self.shutdown.token(),
            start_returned: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Bookkeeping for a spawned service task
struct Supervised {
    index: usize,
    name: ServiceName,
    start_returned: Arc<AtomicBool>,
}

/// Everything one service needs to be launched on its own task
struct ServiceTask {
    index: usize,
    name: ServiceName,
    service: Arc<dyn Service>,
    context: StartContext,
    dependencies: Vec<(usize, ServiceName)>,
    states: Arc<StateTable>,
    config: LauncherConfig,
    token: CancellationToken,
    /// Set once the start action returned, so a later panic is the probe's
    start_returned: Arc<AtomicBool>,
}

impl ServiceTask {
    async fn drive(self) {
        if let Err(failure) = self.await_dependencies().await {
            self.fail(failure);
            return;
        }

        if !self.states.mark_starting(self.index) {
            return;
        }
        info!(service = %self.name, "starting service");

        if let Err(failure) = self.start().await {
            self.fail(failure);
            return;
        }
        self.start_returned.store(true, Ordering::SeqCst);

        match self.await_readiness().await {
            Ok(()) => {
                if self.states.mark_ready(self.index) {
                    info!(service = %self.name, "service ready");
                }
            }
            Err(failure) => self.fail(failure),
        }
    }

    async fn await_dependencies(&self) -> Result<(), ServiceFailure> {
        self.token.throw_if_cancelled().map_err(cancelled)?;
        if self.dependencies.is_empty() {
            return Ok(());
        }
        debug!(
            service = %self.name,
            dependencies = ?self.dependencies.iter().map(|(_, name)| name.as_str()).collect::<Vec<_>>(),
            "waiting for dependencies"
        );

        let indices: Vec<usize> = self.dependencies.iter().map(|(index, _)| *index).collect();
        let settled = run_cancellable(wait_settled(self.states.subscribe(), indices), &self.token)
            .await
            .map_err(cancelled)?;

        match settled {
            Settled::Ready => Ok(()),
            Settled::Failed { index, failure } => {
                let dependency = self
                    .dependencies
                    .iter()
                    .find(|(candidate, _)| *candidate == index)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_else(|| self.name.clone());
                Err(match failure {
                    Some(failure) => failure.cascade_to_dependent(dependency),
                    None => ServiceFailure::DependencyFailed { dependency },
                })
            }
            Settled::Closed => Err(ServiceFailure::Cancelled {
                reason: "state table closed".to_string(),
            }),
        }
    }

    async fn start(&self) -> Result<(), ServiceFailure> {
        let timeout = Timeout::after(self.config.start_timeout);
        let deadline = timeout.to_deadline(Instant::now());

        match run_until(self.service.start(&self.context), deadline, &self.token).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ServiceFailure::StartAction {
                message: err.to_string(),
            }),
            Err(LifecycleError::Timeout) => Err(ServiceFailure::StartTimeout {
                timeout_ms: timeout.as_millis(),
            }),
            Err(err) => Err(cancelled(err)),
        }
    }

    async fn await_readiness(&self) -> Result<(), ServiceFailure> {
        let timeout = Timeout::after(self.config.readiness_timeout);
        let deadline = timeout.to_deadline(Instant::now());

        match run_until(self.probe_until_ready(), deadline, &self.token).await {
            Ok(()) => Ok(()),
            Err(LifecycleError::Timeout) => Err(ServiceFailure::ReadinessTimeout {
                timeout_ms: timeout.as_millis(),
            }),
            Err(err) => Err(cancelled(err)),
        }
    }

    async fn probe_until_ready(&self) {
        let mut ticker = tokio::time::interval(self.config.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.service.is_ready().await {
                return;
            }
            trace!(service = %self.name, "not ready yet");
        }
    }

    fn fail(&self, failure: ServiceFailure) {
        if self.states.mark_failed(self.index, failure.clone()) {
            warn!(service = %self.name, error = %failure, "service failed");
        }
    }
}

fn cancelled(err: LifecycleError) -> ServiceFailure {
    match err {
        LifecycleError::Cancelled { reason } => ServiceFailure::Cancelled {
            reason: reason.to_string(),
        },
        LifecycleError::Timeout => ServiceFailure::Cancelled {
            reason: CancellationReason::Timeout.to_string(),
        },
    }
}

/// How a set of dependencies settled
enum Settled {
    Ready,
    Failed {
        index: usize,
        failure: Option<ServiceFailure>,
    },
    Closed,
}

/// Waits until every dependency is Ready or any of them is Failed
async fn wait_settled(
    mut receiver: watch::Receiver<Vec<ServiceRecord>>,
    dependencies: Vec<usize>,
) -> Settled {
    let state_of = |records: &[ServiceRecord], index: usize| records.get(index).map(|r| r.state);
    let records = match receiver
        .wait_for(|records| {
            dependencies
                .iter()
                .any(|&index| state_of(records, index) == Some(ServiceState::Failed))
                || dependencies
                    .iter()
                    .all(|&index| state_of(records, index) == Some(ServiceState::Ready))
        })
        .await
    {
        Ok(records) => records,
        Err(_) => return Settled::Closed,
    };

    for &index in &dependencies {
        if let Some(record) = records.get(index) {
            if record.state == ServiceState::Failed {
                return Settled::Failed {
                    index,
                    failure: record.failure.clone(),
                };
            }
        }
    }
    Settled::Ready
}
