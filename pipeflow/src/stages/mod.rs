//! Stage trait and implementations.
//!
//! Stages are the fundamental units of work in a pipeflow pipeline. A stage
//! only transforms payloads; wiring, fan-out, failure routing and shutdown
//! are handled by the worker that owns it.

pub mod builtin;
mod context;

pub use context::StageContext;

use crate::core::{Payload, StageOutput};
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
///
/// Each live instance owns its stage exclusively and calls `ingest` for one
/// message at a time, so implementations may keep per-instance state.
#[async_trait]
pub trait Stage: Send + Debug {
    /// Processes one input.
    ///
    /// # Errors
    ///
    /// An error is an application-level failure: it is converted into a
    /// [`FailureNotice`](crate::core::FailureNotice) and routed to the
    /// stage's error handler, if any. Nothing is delivered downstream for
    /// that input.
    async fn ingest(&mut self, ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: FnMut(Payload) -> anyhow::Result<StageOutput> + Send,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: FnMut(Payload) -> anyhow::Result<StageOutput> + Send,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: FnMut(Payload) -> anyhow::Result<StageOutput> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: FnMut(Payload) -> anyhow::Result<StageOutput> + Send,
{
    async fn ingest(&mut self, _ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        (self.func)(input)
    }
}
