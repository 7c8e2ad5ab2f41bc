//! Mailbox messages and the shutdown quorum.

use super::StageRef;
use crate::core::Payload;

/// Everything an instance mailbox can carry.
#[derive(Debug)]
pub enum Envelope {
    /// Builder-to-instance wiring, sent after every downstream exists.
    Init(Handshake),
    /// A unit of work.
    Data(Payload),
    /// One upstream producer has finished.
    Shutdown,
    /// Terminate after the messages already queued, without propagation.
    Stop,
    /// This many more producers now feed the instance. Wiring is untouched.
    AddUpstream(usize),
}

/// How many distinct producers feed an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Upstream {
    /// Not known (the root); the first shutdown signal is enough.
    #[default]
    Unknown,
    /// Exactly this many producers.
    Counted(usize),
    /// Owned by a decorator; stopped by its owner, never propagates.
    Owned,
}

impl Upstream {
    /// The count after `extra` more producers join.
    ///
    /// An unknown count becomes exactly `extra`; owned instances stay owned.
    #[must_use]
    pub fn plus(self, extra: usize) -> Self {
        match self {
            Self::Unknown => Self::Counted(extra),
            Self::Counted(n) => Self::Counted(n + extra),
            Self::Owned => Self::Owned,
        }
    }
}

/// Wiring recorded by an instance before it processes data.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    /// Every result is duplicated to each of these.
    pub downstream: Vec<StageRef>,
    /// Receives failure notices.
    pub error_handler: Option<StageRef>,
    /// Producer count for the shutdown quorum.
    pub upstream: Upstream,
}

impl Handshake {
    /// The same wiring, for an instance owned by a decorator.
    #[must_use]
    pub fn owned(&self) -> Self {
        Self {
            upstream: Upstream::Owned,
            ..self.clone()
        }
    }
}

/// Counts shutdown signals against the upstream count.
#[derive(Debug, Clone, Default)]
pub struct ShutdownQuorum {
    upstream: Upstream,
    received: usize,
}

impl ShutdownQuorum {
    /// Creates a quorum for the given upstream.
    #[must_use]
    pub fn new(upstream: Upstream) -> Self {
        Self { upstream, received: 0 }
    }

    /// Counts one signal. Returns true exactly when the quorum is reached.
    pub fn record(&mut self) -> bool {
        self.received += 1;
        match self.upstream {
            Upstream::Unknown => self.received == 1,
            Upstream::Counted(n) => self.received == n.max(1),
            Upstream::Owned => false,
        }
    }

    /// Raises the expected signal count by `extra`.
    pub fn add_upstream(&mut self, extra: usize) {
        self.upstream = self.upstream.plus(extra);
    }

    /// The producer count being waited on.
    #[must_use]
    pub fn upstream(&self) -> Upstream {
        self.upstream
    }

    /// Signals received so far.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Returns true if this instance forwards shutdown when it ends.
    #[must_use]
    pub fn propagates(&self) -> bool {
        self.upstream != Upstream::Owned
    }
}
