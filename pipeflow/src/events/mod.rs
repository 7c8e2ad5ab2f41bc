//! Lifecycle events.
//!
//! Every [`PipelineSystem`](crate::runtime::PipelineSystem) carries one
//! [`EventSink`]; workers and the builder report milestones through it.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

#[cfg(test)]
pub use sink::MockEventSink;

/// A worker task was started.
pub const WORKER_SPAWNED: &str = "worker.spawned";
/// A worker task ended, for any reason.
pub const WORKER_STOPPED: &str = "worker.stopped";
/// A stage raised or reported an application failure.
pub const STAGE_FAILED: &str = "stage.failed";
/// A stage broke its stereotype contract.
pub const STAGE_CONTRACT_VIOLATION: &str = "stage.contract_violation";
/// A specification was realized.
pub const PIPELINE_BUILT: &str = "pipeline.built";
