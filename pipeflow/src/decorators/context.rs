//! What a decorator sees of the runtime.

use crate::config::PipelineConfig;
use crate::core::{InstanceId, Payload};
use crate::errors::Result;
use crate::runtime::{spawn_instance, Envelope, Handshake, InnerChain, PipelineSystem, StageRef};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runtime context of one decorator instance.
#[derive(Debug)]
pub struct DecoratorContext {
    system: PipelineSystem,
    chain: InnerChain,
    instance_id: InstanceId,
    handshake: Handshake,
}

impl DecoratorContext {
    pub(crate) fn new(system: PipelineSystem, chain: InnerChain, instance_id: InstanceId) -> Self {
        Self {
            system,
            chain,
            instance_id,
            handshake: Handshake::default(),
        }
    }

    pub(crate) fn set_handshake(&mut self, handshake: Handshake) {
        self.handshake = handshake;
    }

    /// The owning system.
    #[must_use]
    pub fn system(&self) -> &PipelineSystem {
        &self.system
    }

    /// The system configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        self.system.config()
    }

    /// The wiring this decorator received.
    #[must_use]
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// The decorator's own instance serial.
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Label of the chain this decorator wraps.
    #[must_use]
    pub fn inner_label(&self) -> String {
        self.chain.label()
    }

    /// Creates one inner instance wired with this decorator's handshake.
    ///
    /// # Errors
    ///
    /// Returns [`PipeflowError::SystemClosed`](crate::errors::PipeflowError::SystemClosed) once the system shut down.
    pub async fn spawn_inner(&self) -> Result<InnerInstance> {
        let (stage_ref, handle) = spawn_instance(&self.system, &self.chain)?;
        if !stage_ref.tell(Envelope::Init(self.handshake.owned())).await {
            debug!(inner = %stage_ref, "inner instance ended before its handshake");
        }
        Ok(InnerInstance { stage_ref, handle })
    }
}

/// A decorator-owned instance and its task handle.
#[derive(Debug)]
pub struct InnerInstance {
    stage_ref: StageRef,
    handle: JoinHandle<()>,
}

impl InnerInstance {
    /// The instance handle.
    #[must_use]
    pub fn stage_ref(&self) -> &StageRef {
        &self.stage_ref
    }

    /// Data messages queued or in flight.
    #[must_use]
    pub fn load(&self) -> usize {
        self.stage_ref.load()
    }

    /// Returns true once the instance stopped accepting messages.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.stage_ref.is_closed()
    }

    /// Returns true once the instance task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Sends one data message. Returns false if the instance terminated.
    pub async fn forward(&self, payload: Payload) -> bool {
        self.stage_ref.tell(Envelope::Data(payload)).await
    }

    /// Asks the instance to terminate after the messages already queued.
    pub async fn request_stop(&self) -> bool {
        self.stage_ref.tell(Envelope::Stop).await
    }

    /// Waits for the instance task to end.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            if err.is_panic() {
                warn!(inner = %self.stage_ref, "inner instance panicked");
            }
        }
    }

    /// Stops the instance and waits for it.
    pub async fn stop(self) {
        self.request_stop().await;
        self.join().await;
    }
}
