//! Live workers and the system that tracks them.
//!
//! Each instance is a tokio task owning a bounded mailbox. Instances
//! address each other through [`StageRef`] handles and learn their wiring
//! from an [`Envelope::Init`] handshake sent after their downstream exists.

mod envelope;
mod spawn;
mod stage_ref;
mod system;
mod worker;

pub use envelope::{Envelope, Handshake, ShutdownQuorum, Upstream};
pub use stage_ref::{channel, Mailbox, StageRef};
pub use system::{PipelineSystem, PipelineSystemBuilder};

pub(crate) use spawn::{spawn_instance, InnerChain};
pub(crate) use worker::propagate_shutdown;
