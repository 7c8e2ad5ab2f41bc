//! One fresh inner instance per message.

use super::{Decorator, DecoratorContext, InnerInstance};
use crate::core::Payload;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, warn};

/// Creates one inner instance per message, forwards the message to it, and
/// tells it to stop.
///
/// Nothing is reused, so per-message state never leaks between messages.
/// Finished instances are reaped on the next message; `drain` waits for
/// whatever is still running.
#[derive(Debug, Default)]
pub struct SpinUpPool {
    running: Vec<InnerInstance>,
}

impl SpinUpPool {
    /// Creates an empty spin-up decorator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instances created and not yet reaped.
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.len()
    }
}

#[async_trait]
impl Decorator for SpinUpPool {
    async fn intercept(&mut self, ctx: &DecoratorContext, payload: Payload) {
        self.running.retain(|instance| !instance.is_finished());

        let instance = match ctx.spawn_inner().await {
            Ok(instance) => instance,
            Err(err) => {
                error!(error = %err, inner = %ctx.inner_label(), "could not spin up instance, message dropped");
                return;
            }
        };
        if !instance.forward(payload).await {
            warn!(inner = %instance.stage_ref(), "spun-up instance ended early, message dropped");
        }
        instance.request_stop().await;
        self.running.push(instance);
    }

    async fn drain(&mut self, _ctx: &DecoratorContext) {
        join_all(self.running.drain(..).map(InnerInstance::join)).await;
    }
}
