//! A terminal sink for `build_with_sink`.

use crate::core::{DescriptorId, Payload};
use crate::runtime::{channel, Envelope, Mailbox, ShutdownQuorum, StageRef};
use std::time::Duration;
use tokio::time::Instant;

/// Receives leaf results and honours the leaf shutdown quorum.
#[derive(Debug)]
pub struct CollectingSink {
    stage_ref: StageRef,
    mailbox: Mailbox,
    quorum: ShutdownQuorum,
    finished: bool,
}

impl CollectingSink {
    /// Creates a sink with the given mailbox capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (stage_ref, mailbox) = channel(DescriptorId::new(), "sink", capacity);
        Self {
            stage_ref,
            mailbox,
            quorum: ShutdownQuorum::default(),
            finished: false,
        }
    }

    /// The handle to pass to the builder.
    #[must_use]
    pub fn stage_ref(&self) -> StageRef {
        self.stage_ref.clone()
    }

    /// Returns true once every leaf has signalled shutdown.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The next result, or `None` on shutdown or timeout.
    pub async fn next(&mut self, timeout: Duration) -> Option<Payload> {
        self.next_before(Instant::now() + timeout).await
    }

    /// Up to `count` results, stopping early on shutdown or timeout.
    pub async fn take(&mut self, count: usize, timeout: Duration) -> Vec<Payload> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::with_capacity(count);
        while results.len() < count {
            match self.next_before(deadline).await {
                Some(payload) => results.push(payload),
                None => break,
            }
        }
        results
    }

    /// Every result until the shutdown quorum completes or `timeout` elapses.
    pub async fn collect_until_shutdown(&mut self, timeout: Duration) -> Vec<Payload> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::new();
        while let Some(payload) = self.next_before(deadline).await {
            results.push(payload);
        }
        results
    }

    async fn next_before(&mut self, deadline: Instant) -> Option<Payload> {
        while !self.finished {
            let envelope = tokio::time::timeout_at(deadline, self.mailbox.recv()).await.ok()??;
            match envelope {
                Envelope::Init(handshake) => self.quorum = ShutdownQuorum::new(handshake.upstream),
                Envelope::Data(payload) => {
                    self.mailbox.complete_one();
                    return Some(payload);
                }
                Envelope::Shutdown => self.finished = self.quorum.record(),
                Envelope::Stop => self.finished = true,
                Envelope::AddUpstream(extra) => self.quorum.add_upstream(extra),
            }
        }
        None
    }
}
