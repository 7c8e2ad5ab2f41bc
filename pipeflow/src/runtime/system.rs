//! The pipeline system: an explicit context owning every worker.

use crate::config::PipelineConfig;
use crate::errors::{ContractViolation, PipeflowError, Result};
use crate::events::{EventSink, NoOpEventSink, WORKER_SPAWNED, WORKER_STOPPED};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

/// Shared runtime context for a set of pipelines.
///
/// Tracks live workers, carries the configuration and event sink, records
/// contract violations, and tears everything down on [`shutdown`].
/// Several independent systems may coexist in one process.
///
/// [`shutdown`]: Self::shutdown
#[derive(Clone)]
pub struct PipelineSystem {
    inner: Arc<SystemInner>,
}

struct SystemInner {
    name: String,
    config: PipelineConfig,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
    live: AtomicUsize,
    changed: Notify,
    violations: Mutex<Vec<ContractViolation>>,
}

/// Builder for [`PipelineSystem`].
pub struct PipelineSystemBuilder {
    name: String,
    config: PipelineConfig,
    events: Arc<dyn EventSink>,
}

impl PipelineSystemBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Creates the system.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::Config`] if the configuration is invalid.
    pub fn build(self) -> Result<PipelineSystem> {
        self.config.validate()?;
        Ok(PipelineSystem::assemble(self.name, self.config, self.events))
    }
}

/// Decrements the live count when a worker task ends or is aborted.
struct LiveGuard {
    inner: Arc<SystemInner>,
    label: String,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.inner.live.fetch_sub(1, Ordering::AcqRel);
        self.inner.events.try_emit(
            WORKER_STOPPED,
            Some(serde_json::json!({ "worker": self.label })),
        );
        self.inner.changed.notify_waiters();
    }
}

impl PipelineSystem {
    /// Starts building a system.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineSystemBuilder {
        PipelineSystemBuilder {
            name: name.into(),
            config: PipelineConfig::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Creates a system with default configuration and no event sink.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::assemble(name.into(), PipelineConfig::default(), Arc::new(NoOpEventSink))
    }

    fn assemble(name: String, config: PipelineConfig, events: Arc<dyn EventSink>) -> Self {
        info!(system = %name, config = ?config, "pipeline system started");
        Self {
            inner: Arc::new(SystemInner {
                name,
                config,
                events,
                cancel: CancellationToken::new(),
                live: AtomicUsize::new(0),
                changed: Notify::new(),
                violations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The system name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration shared by every worker.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Number of worker tasks currently running.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Waits until at most `target` workers are live.
    ///
    /// Returns false if `timeout` elapsed first.
    pub async fn wait_for_live_workers(&self, target: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let changed = self.inner.changed.notified();
                tokio::pin!(changed);
                changed.as_mut().enable();
                if self.live_workers() <= target {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Contract violations recorded so far.
    #[must_use]
    pub fn violations(&self) -> Vec<ContractViolation> {
        self.inner.violations.lock().clone()
    }

    /// Cancels every worker of every pipeline in this system.
    pub fn shutdown(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!(system = %self.inner.name, live = self.live_workers(), "pipeline system shutting down");
            self.inner.cancel.cancel();
        }
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub(crate) fn record_violation(&self, violation: ContractViolation) {
        self.inner.violations.lock().push(violation);
    }

    pub(crate) fn emit(&self, event_type: &str, data: serde_json::Value) {
        self.inner.events.try_emit(event_type, Some(data));
    }

    /// Spawns a tracked worker task inside a `worker` span.
    pub(crate) fn spawn_worker<F>(&self, label: &str, task: F) -> Result<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(PipeflowError::SystemClosed(self.inner.name.clone()));
        }

        self.inner.live.fetch_add(1, Ordering::AcqRel);
        let guard = LiveGuard {
            inner: Arc::clone(&self.inner),
            label: label.to_string(),
        };
        self.emit(WORKER_SPAWNED, serde_json::json!({ "worker": label }));

        let span = tracing::debug_span!("worker", system = %self.inner.name, worker = %label);
        Ok(tokio::spawn(
            async move {
                let _guard = guard;
                task.await;
            }
            .instrument(span),
        ))
    }
}

impl std::fmt::Debug for PipelineSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSystem")
            .field("name", &self.inner.name)
            .field("live_workers", &self.live_workers())
            .field("closed", &self.is_closed())
            .finish()
    }
}
