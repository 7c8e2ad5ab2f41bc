//! Stages for exercising pipelines in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::core::{InstanceId, Payload, StageOutput};
use crate::stages::{Stage, StageContext};

/// Passes its input through and records it along with the instance id.
///
/// Clones share one record, so a clone can be handed to a stage factory
/// while the test keeps the original.
#[derive(Debug, Clone, Default)]
pub struct RecordingStage {
    records: Arc<Mutex<Vec<(InstanceId, Payload)>>>,
}

impl RecordingStage {
    /// Creates a recorder with no records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every payload seen, in arrival order.
    #[must_use]
    pub fn payloads(&self) -> Vec<Payload> {
        self.records.lock().iter().map(|(_, payload)| payload.clone()).collect()
    }

    /// The instance that handled each payload, in arrival order.
    #[must_use]
    pub fn instances(&self) -> Vec<InstanceId> {
        self.records.lock().iter().map(|(instance, _)| *instance).collect()
    }

    /// Number of payloads seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    async fn ingest(&mut self, ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        self.records.lock().push((ctx.instance_id(), input.clone()));
        Ok(StageOutput::Single(input))
    }
}

/// Fails on one trigger payload and passes everything else through.
#[derive(Debug, Clone)]
pub struct FailingStage {
    trigger: Payload,
}

impl FailingStage {
    /// Creates a stage that fails on `trigger`.
    #[must_use]
    pub fn on(trigger: impl Into<Payload>) -> Self {
        Self {
            trigger: trigger.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    async fn ingest(&mut self, _ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        if input == self.trigger {
            anyhow::bail!("rejected trigger input");
        }
        Ok(StageOutput::Single(input))
    }
}

/// Emits the same payload for every input.
#[derive(Debug, Clone)]
pub struct ConstantStage {
    value: Payload,
}

impl ConstantStage {
    /// Creates a stage emitting `value`.
    #[must_use]
    pub fn new(value: impl Into<Payload>) -> Self {
        Self { value: value.into() }
    }
}

#[async_trait]
impl Stage for ConstantStage {
    async fn ingest(&mut self, _ctx: &StageContext, _input: Payload) -> anyhow::Result<StageOutput> {
        Ok(StageOutput::Single(self.value.clone()))
    }
}

/// Shared gate that holds [`GatedStage`]s until opened.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    open: CancellationToken,
    entered: Arc<Mutex<Vec<InstanceId>>>,
    changed: Arc<Notify>,
}

impl Gate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A stage blocked by this gate.
    #[must_use]
    pub fn stage(&self) -> GatedStage {
        GatedStage { gate: self.clone() }
    }

    /// Releases every waiting and future stage.
    pub fn open(&self) {
        self.open.cancel();
    }

    /// Instances that have entered the gate, in arrival order.
    #[must_use]
    pub fn entered(&self) -> Vec<InstanceId> {
        self.entered.lock().clone()
    }

    /// Waits until at least `count` messages have entered the gate.
    ///
    /// Returns false if `timeout` elapsed first.
    pub async fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let changed = self.changed.notified();
                tokio::pin!(changed);
                changed.as_mut().enable();
                if self.entered.lock().len() >= count {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

/// Passes its input through once its [`Gate`] opens.
#[derive(Debug, Clone)]
pub struct GatedStage {
    gate: Gate,
}

#[async_trait]
impl Stage for GatedStage {
    async fn ingest(&mut self, ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        self.gate.entered.lock().push(ctx.instance_id());
        self.gate.changed.notify_waiters();
        self.gate.open.cancelled().await;
        Ok(StageOutput::Single(input))
    }
}
