//! The handle callers inject messages through.

use crate::core::Payload;
use crate::runtime::{Envelope, PipelineSystem, StageRef};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Entry point of a built pipeline, bound to its root instance.
///
/// Owns the task handles of every top-level worker of the pipeline (one per
/// descriptor plus its error handlers); decorator-owned instances are
/// managed by their decorators.
#[derive(Debug)]
pub struct EntryPoint {
    root: StageRef,
    system: PipelineSystem,
    workers: Vec<JoinHandle<()>>,
}

impl EntryPoint {
    pub(crate) fn new(root: StageRef, system: PipelineSystem, workers: Vec<JoinHandle<()>>) -> Self {
        Self { root, system, workers }
    }

    /// The root instance.
    #[must_use]
    pub fn root(&self) -> &StageRef {
        &self.root
    }

    /// The system the pipeline runs in.
    #[must_use]
    pub fn system(&self) -> &PipelineSystem {
        &self.system
    }

    /// Sends a message to the root, waiting only for mailbox space.
    ///
    /// Fire-and-forget: results flow downstream, failures to error handlers.
    pub async fn put(&self, payload: impl Into<Payload>) {
        if !self.root.tell(Envelope::Data(payload.into())).await {
            warn!(root = %self.root, "pipeline root has terminated, message dropped");
        }
    }

    /// Sends a message if the root mailbox has room right now.
    pub fn try_put(&self, payload: impl Into<Payload>) -> bool {
        self.root.try_tell(Envelope::Data(payload.into()))
    }

    /// Sends the shutdown signal to the root.
    ///
    /// Messages already queued are processed first; the signal then travels
    /// the topology as each node's upstream quorum completes.
    pub async fn close(&self) {
        if !self.root.tell(Envelope::Shutdown).await {
            debug!(root = %self.root, "pipeline root already terminated");
        }
    }

    /// Closes the pipeline and waits for every top-level worker to end.
    ///
    /// Workers still running after the configured shutdown timeout are
    /// aborted. Returns true if everything ended gracefully.
    pub async fn shutdown(self) -> bool {
        self.close().await;

        let aborts: Vec<_> = self.workers.iter().map(JoinHandle::abort_handle).collect();
        let timeout = self.system.config().shutdown_timeout();
        let graceful = tokio::time::timeout(timeout, join_all(self.workers)).await.is_ok();

        if graceful {
            info!(root = %self.root, "pipeline shut down");
        } else {
            warn!(root = %self.root, timeout_ms = timeout.as_millis(), "pipeline shutdown timed out, aborting workers");
            for abort in aborts {
                abort.abort();
            }
        }
        graceful
    }
}
