//! Helpers for testing pipelines.
//!
//! [`CollectingSink`] stands in for the external sink of
//! `build_with_sink`; the stages here record, fail, or block on demand.

mod mocks;
mod sink;

pub use mocks::{ConstantStage, FailingStage, Gate, GatedStage, RecordingStage};
pub use sink::CollectingSink;
