//! Addressable handles to live instances.

use super::Envelope;
use crate::core::{DescriptorId, InstanceId};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A cloneable handle for sending envelopes to one instance.
///
/// Each handle shares a load counter with its mailbox: it counts data
/// messages that are queued or being processed, and load-balanced pools
/// route on it.
#[derive(Clone)]
pub struct StageRef {
    stage_id: DescriptorId,
    instance_id: InstanceId,
    label: Arc<str>,
    sender: mpsc::Sender<Envelope>,
    load: Arc<AtomicUsize>,
}

/// The receiving half of an instance mailbox.
#[derive(Debug)]
pub struct Mailbox {
    receiver: mpsc::Receiver<Envelope>,
    load: Arc<AtomicUsize>,
}

/// Creates a bounded mailbox and the handle addressing it.
#[must_use]
pub fn channel(stage_id: DescriptorId, label: impl Into<Arc<str>>, capacity: usize) -> (StageRef, Mailbox) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let load = Arc::new(AtomicUsize::new(0));
    let stage_ref = StageRef {
        stage_id,
        instance_id: InstanceId::next(),
        label: label.into(),
        sender,
        load: Arc::clone(&load),
    };
    (stage_ref, Mailbox { receiver, load })
}

impl StageRef {
    /// The descriptor this instance realizes.
    #[must_use]
    pub fn stage_id(&self) -> DescriptorId {
        self.stage_id
    }

    /// The instance serial.
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Log label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Data messages queued or in flight.
    #[must_use]
    pub fn load(&self) -> usize {
        self.load.load(Ordering::Acquire)
    }

    /// Returns true once the instance has terminated.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends an envelope, waiting for mailbox space.
    ///
    /// Returns false if the instance has terminated.
    pub async fn tell(&self, envelope: Envelope) -> bool {
        let is_data = matches!(envelope, Envelope::Data(_));
        if is_data {
            self.load.fetch_add(1, Ordering::AcqRel);
        }
        if self.sender.send(envelope).await.is_ok() {
            true
        } else {
            if is_data {
                self.load.fetch_sub(1, Ordering::AcqRel);
            }
            false
        }
    }

    /// Sends an envelope if there is room right now.
    ///
    /// Returns false if the mailbox is full or the instance has terminated.
    pub fn try_tell(&self, envelope: Envelope) -> bool {
        let is_data = matches!(envelope, Envelope::Data(_));
        if is_data {
            self.load.fetch_add(1, Ordering::AcqRel);
        }
        if self.sender.try_send(envelope).is_ok() {
            true
        } else {
            if is_data {
                self.load.fetch_sub(1, Ordering::AcqRel);
            }
            false
        }
    }
}

impl fmt::Debug for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRef")
            .field("label", &self.label)
            .field("instance_id", &self.instance_id)
            .field("load", &self.load())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.label, self.instance_id)
    }
}

impl Mailbox {
    /// Waits for the next envelope. `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Marks one data message as fully processed.
    pub fn complete_one(&self) {
        let _ = self
            .load
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}
