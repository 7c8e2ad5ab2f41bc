//! Structured failure notifications sent to error handlers.

use super::{DescriptorId, InstanceId, Payload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An application-level failure raised inside a stage.
///
/// Built at the stage boundary and delivered to the stage's error handler
/// as a [`Payload::Failure`]. Failures never flow back upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureNotice {
    /// The descriptor of the failing stage.
    pub stage_id: DescriptorId,
    /// The registered name of the failing stage type.
    pub stage_type: String,
    /// The instance that raised the failure.
    pub instance_id: InstanceId,
    /// Human-readable failure message, including its cause chain.
    pub message: String,
    /// The input being processed when the failure occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Payload>,
    /// When the failure was observed.
    pub occurred_at: DateTime<Utc>,
}

impl FailureNotice {
    /// Creates a notice stamped with the current time.
    #[must_use]
    pub fn new(
        stage_id: DescriptorId,
        stage_type: impl Into<String>,
        instance_id: InstanceId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage_id,
            stage_type: stage_type.into(),
            instance_id,
            message: message.into(),
            input: None,
            occurred_at: Utc::now(),
        }
    }

    /// Attaches the offending input.
    #[must_use]
    pub fn with_input(mut self, input: Payload) -> Self {
        self.input = Some(input);
        self
    }
}
