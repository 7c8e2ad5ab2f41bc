//! Stage stereotypes and their conformance rules.

use super::{Payload, StageOutput};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The contract a stage's results must honour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stereotype {
    /// `I -> O`, at most one result.
    #[default]
    Transform,
    /// `T -> T`, passes its input through unchanged or drops it.
    Filter,
    /// `T -> T`, always passes its input through unchanged.
    SideEffect,
    /// `I -> [O]`, every non-null item is delivered independently.
    Multi,
}

impl fmt::Display for Stereotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transform => write!(f, "transform"),
            Self::Filter => write!(f, "filter"),
            Self::SideEffect => write!(f, "side_effect"),
            Self::Multi => write!(f, "multi"),
        }
    }
}

impl Stereotype {
    /// Returns true if input and output share one declared type.
    #[must_use]
    pub fn is_single_typed(&self) -> bool {
        matches!(self, Self::Filter | Self::SideEffect)
    }

    /// Checks a result against this stereotype.
    ///
    /// # Errors
    ///
    /// Returns the broken rule when the result does not conform.
    pub fn check(&self, input: &Payload, output: &StageOutput) -> Result<(), &'static str> {
        match (self, output) {
            (Self::Transform, StageOutput::Empty | StageOutput::Single(_)) => Ok(()),
            (Self::Transform, StageOutput::Many(_)) => {
                Err("transform stages emit at most one result")
            }
            (Self::Filter, StageOutput::Empty) => Ok(()),
            (Self::Filter, StageOutput::Single(result)) if result.is_null() || result == input => {
                Ok(())
            }
            (Self::Filter, _) => Err("filter stages must emit their input unchanged or nothing"),
            (Self::SideEffect, StageOutput::Single(result)) if result == input => Ok(()),
            (Self::SideEffect, _) => Err("side-effect stages must emit their input unchanged"),
            (Self::Multi, StageOutput::Empty | StageOutput::Many(_)) => Ok(()),
            (Self::Multi, StageOutput::Single(_)) => Err("multi-output stages emit a sequence"),
        }
    }
}
