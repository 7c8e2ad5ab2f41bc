//! Per-instance context handed to every `ingest` call.

use crate::core::{DescriptorId, InstanceId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Identity of the running instance plus a side channel for failures.
///
/// `report_error` lets a stage surface an application failure to its error
/// handler without aborting the current message.
#[derive(Debug)]
pub struct StageContext {
    stage_id: DescriptorId,
    stage_type: Arc<str>,
    instance_id: InstanceId,
    reported: Mutex<Vec<String>>,
}

impl StageContext {
    /// Creates a context for one live instance.
    #[must_use]
    pub fn new(stage_id: DescriptorId, stage_type: impl Into<Arc<str>>, instance_id: InstanceId) -> Self {
        Self {
            stage_id,
            stage_type: stage_type.into(),
            instance_id,
            reported: Mutex::new(Vec::new()),
        }
    }

    /// The descriptor this instance realizes.
    #[must_use]
    pub fn stage_id(&self) -> DescriptorId {
        self.stage_id
    }

    /// The registered stage type name.
    #[must_use]
    pub fn stage_type(&self) -> &str {
        &self.stage_type
    }

    /// The serial of this instance.
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Queues a failure for the error handler.
    ///
    /// Reports are delivered after the current `ingest` call returns.
    pub fn report_error(&self, message: impl Into<String>) {
        self.reported.lock().push(message.into());
    }

    /// Drains queued reports.
    pub(crate) fn take_reports(&self) -> Vec<String> {
        std::mem::take(&mut *self.reported.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_drain_once() {
        let ctx = StageContext::new(DescriptorId::new(), "uppercase", InstanceId::next());
        ctx.report_error("first");
        ctx.report_error("second");

        assert_eq!(ctx.take_reports(), vec!["first".to_string(), "second".to_string()]);
        assert!(ctx.take_reports().is_empty());
        assert_eq!(ctx.stage_type(), "uppercase");
    }
}
