//! The decorator worker loop.

use super::{Decorator, DecoratorContext};
use crate::runtime::{propagate_shutdown, Envelope, Mailbox, ShutdownQuorum};
use tracing::{debug, error};

/// Drives one decorator instance.
pub(crate) struct DecoratorWorker {
    decorator: Box<dyn Decorator>,
    ctx: DecoratorContext,
    mailbox: Mailbox,
    quorum: ShutdownQuorum,
}

impl DecoratorWorker {
    pub(crate) fn new(decorator: Box<dyn Decorator>, ctx: DecoratorContext, mailbox: Mailbox) -> Self {
        Self {
            decorator,
            ctx,
            mailbox,
            quorum: ShutdownQuorum::default(),
        }
    }

    pub(crate) async fn run(mut self) {
        let cancel = self.ctx.system().cancel_token();
        loop {
            let envelope = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = self.mailbox.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            match envelope {
                Envelope::Init(handshake) => {
                    self.quorum = ShutdownQuorum::new(handshake.upstream);
                    self.ctx.set_handshake(handshake);
                    if let Err(err) = self.decorator.initialize(&self.ctx).await {
                        error!(error = %err, inner = %self.ctx.inner_label(), "decorator failed to initialize");
                        self.decorator.drain(&self.ctx).await;
                        if self.quorum.propagates() {
                            propagate_shutdown(self.ctx.handshake()).await;
                        }
                        break;
                    }
                    debug!(inner = %self.ctx.inner_label(), "decorator initialized");
                }
                Envelope::Data(payload) => {
                    self.decorator.intercept(&self.ctx, payload).await;
                    self.mailbox.complete_one();
                }
                Envelope::Shutdown => {
                    if self.quorum.record() {
                        debug!(received = self.quorum.received(), "shutdown quorum reached, draining");
                        self.decorator.drain(&self.ctx).await;
                        propagate_shutdown(self.ctx.handshake()).await;
                        break;
                    }
                }
                Envelope::AddUpstream(extra) => self.quorum.add_upstream(extra),
                Envelope::Stop => {
                    self.decorator.drain(&self.ctx).await;
                    break;
                }
            }
        }
        debug!("decorator terminated");
    }
}
