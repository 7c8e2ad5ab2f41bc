//! Core domain model types for pipeflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Identifiers and declared type tags
//! - Payloads and failure notices
//! - Stage output and stereotype conformance

mod ids;
mod notice;
mod output;
mod payload;
mod stereotype;
mod type_tag;

pub use ids::{DescriptorId, InstanceId};
pub use notice::FailureNotice;
pub use output::StageOutput;
pub use payload::Payload;
pub use stereotype::Stereotype;
pub use type_tag::TypeTag;
