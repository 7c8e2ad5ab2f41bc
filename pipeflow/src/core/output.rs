//! Stage output type with factory methods.

use super::Payload;

/// The result of one `ingest` call.
///
/// Transform, filter and side-effect stages emit at most one item;
/// multi-output stages emit a finite sequence. Null items are dropped
/// before fan-out.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StageOutput {
    /// Nothing to deliver.
    #[default]
    Empty,
    /// A single result.
    Single(Payload),
    /// A sequence of results, each delivered independently.
    Many(Vec<Payload>),
}

impl StageOutput {
    /// Creates an empty output.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Creates a single-item output.
    #[must_use]
    pub fn single(payload: impl Into<Payload>) -> Self {
        Self::Single(payload.into())
    }

    /// Creates a multi-item output.
    #[must_use]
    pub fn many<I, P>(items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Payload>,
    {
        Self::Many(items.into_iter().map(Into::into).collect())
    }

    /// Returns true if nothing would be delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Single(payload) => payload.is_null(),
            Self::Many(items) => items.iter().all(Payload::is_null),
        }
    }

    /// Returns the deliverable items, skipping nulls.
    #[must_use]
    pub fn into_items(self) -> Vec<Payload> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(payload) if payload.is_null() => Vec::new(),
            Self::Single(payload) => vec![payload],
            Self::Many(items) => items.into_iter().filter(|p| !p.is_null()).collect(),
        }
    }
}

impl From<Option<Payload>> for StageOutput {
    fn from(payload: Option<Payload>) -> Self {
        payload.map_or(Self::Empty, Self::Single)
    }
}

impl From<Payload> for StageOutput {
    fn from(payload: Payload) -> Self {
        Self::Single(payload)
    }
}
