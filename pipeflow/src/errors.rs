//! Error types for the pipeflow framework.
//!
//! Topology errors are raised synchronously by the [`Specification`] API
//! and the builder; each carries a [`ContractErrorInfo`] with a stable
//! code and a fix hint. Stage-contract violations are recorded at runtime
//! by the worker that detected them.
//!
//! [`Specification`]: crate::spec::Specification

use crate::core::{DescriptorId, Stereotype, TypeTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Code for an output/input tag mismatch on an edge or wrapper.
pub const TYPE_INCOMPATIBLE_CODE: &str = "PIPE-001-TYPE";
/// Code for wrapping a slot that already has an outer wrapper.
pub const DOUBLE_WRAP_CODE: &str = "PIPE-002-DOUBLE_WRAP";
/// Code for a descriptor reachable from itself.
pub const CYCLE_CODE: &str = "PIPE-003-CYCLE";

/// The main error type for pipeflow operations.
#[derive(Debug, Error)]
pub enum PipeflowError {
    /// Adjacent nodes, or a node and its wrapper, disagree on a type tag.
    #[error("{0}")]
    TypeIncompatible(#[from] TypeIncompatibleError),

    /// A wrapper slot was wrapped twice.
    #[error("{0}")]
    DoubleWrap(#[from] DoubleWrapError),

    /// The topology contains a cycle.
    #[error("{0}")]
    CyclicTopology(#[from] CycleDetectedError),

    /// No stage type is registered under this name.
    #[error("Unknown stage type: {0}")]
    UnknownStageType(String),

    /// No decorator type is registered under this name.
    #[error("Unknown decorator type: {0}")]
    UnknownDecoratorType(String),

    /// The descriptor id does not belong to this specification.
    #[error("Unknown descriptor: {0}")]
    UnknownDescriptor(DescriptorId),

    /// The wrapper slot does not exist in the referenced chain.
    #[error("Unknown wrapper slot at depth {depth} of {target}")]
    UnknownWrapperSlot {
        /// The node or handler owning the chain.
        target: DescriptorId,
        /// The requested chain depth.
        depth: usize,
    },

    /// The stage type cannot consume failure notices.
    #[error("Stage type '{0}' is not an error handler (input must be 'failure')")]
    NotAnErrorHandler(String),

    /// The pipeline system has been shut down.
    #[error("Pipeline system '{0}' is closed")]
    SystemClosed(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tracing subscriber setup failed.
    #[error("Tracing setup error: {0}")]
    Tracing(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipeflowError {
    /// Returns the diagnostic info for topology errors.
    #[must_use]
    pub fn error_info(&self) -> Option<&ContractErrorInfo> {
        match self {
            Self::TypeIncompatible(err) => Some(&err.error_info),
            Self::DoubleWrap(err) => Some(&err.error_info),
            Self::CyclicTopology(err) => Some(&err.error_info),
            _ => None,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = PipeflowError> = std::result::Result<T, E>;

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPE-003-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info, with the default hint for its code.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        let code = code.into();
        let fix_hint = ContractSuggestions::get(&code).map(str::to_string);
        Self {
            code,
            summary: summary.into(),
            fix_hint,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised when an edge or wrapper joins mismatched type tags.
#[derive(Debug, Clone, Error)]
#[error("Type incompatible: {producer} emits '{produced}' but {consumer} expects '{expected}'")]
pub struct TypeIncompatibleError {
    /// What produces the value (a stage or decorator name).
    pub producer: String,
    /// What consumes it.
    pub consumer: String,
    /// The tag the producer emits.
    pub produced: TypeTag,
    /// The tag the consumer accepts.
    pub expected: TypeTag,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl TypeIncompatibleError {
    /// Creates a new type incompatibility error.
    #[must_use]
    pub fn new(
        producer: impl Into<String>,
        consumer: impl Into<String>,
        produced: TypeTag,
        expected: TypeTag,
    ) -> Self {
        let producer = producer.into();
        let consumer = consumer.into();
        let info = ContractErrorInfo::new(
            TYPE_INCOMPATIBLE_CODE,
            format!("'{producer}' output does not match '{consumer}' input"),
        )
        .with_context_entry("produced", produced.as_str())
        .with_context_entry("expected", expected.as_str());

        Self {
            producer,
            consumer,
            produced,
            expected,
            error_info: info,
        }
    }
}

/// Error raised when a slot that already has an outer wrapper is wrapped again.
#[derive(Debug, Clone, Error)]
#[error("Slot {target} at depth {depth} is already wrapped by '{existing}'")]
pub struct DoubleWrapError {
    /// The node or handler owning the chain.
    pub target: DescriptorId,
    /// The slot depth (0 = the bare stage).
    pub depth: usize,
    /// The decorator already occupying the slot.
    pub existing: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl DoubleWrapError {
    /// Creates a new double-wrap error.
    #[must_use]
    pub fn new(target: DescriptorId, depth: usize, existing: impl Into<String>) -> Self {
        let existing = existing.into();
        let info = ContractErrorInfo::new(
            DOUBLE_WRAP_CODE,
            format!("Slot {depth} of {target} is already wrapped by '{existing}'"),
        )
        .with_context_entry("target", target.to_string());

        Self {
            target,
            depth,
            existing,
            error_info: info,
        }
    }
}

/// Error raised when a cycle is detected in the topology.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in topology: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            CYCLE_CODE,
            format!("Topology contains a cycle: {}", cycle_path.join(" -> ")),
        );

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

/// A stage returned a result its stereotype forbids.
///
/// Signals a defect in the stage implementation, not a data problem. The
/// offending instance terminates after recording it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Contract violation in {stage_type} ({stereotype}) at {stage_id}: {reason}")]
pub struct ContractViolation {
    /// The descriptor of the offending stage.
    pub stage_id: DescriptorId,
    /// The registered stage type name.
    pub stage_type: String,
    /// The stereotype that was broken.
    pub stereotype: Stereotype,
    /// The broken rule.
    pub reason: String,
}

/// Provides default suggestions for common contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            TYPE_INCOMPATIBLE_CODE => Some(
                "Insert a converting stage between the two nodes, or register the \
                 child with the parent's output tag.",
            ),
            DOUBLE_WRAP_CODE => Some(
                "Wrap the existing outer wrapper with wrap_wrapper instead of \
                 wrapping the same slot twice.",
            ),
            CYCLE_CODE => Some(
                "Remove the edge that makes a descriptor reachable from itself. \
                 Shared children (DAG merges) are fine; back-edges are not.",
            ),
            _ => None,
        }
    }
}
