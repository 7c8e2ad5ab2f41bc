//! Data carried between stages.

use super::{FailureNotice, TypeTag};
use serde::{Deserialize, Serialize};

/// A message payload.
///
/// `Json(Value::Null)` is the null payload: stages may emit it to mean
/// "no result", and it is never delivered downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes, base64-encoded when serialized.
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    /// A signed integer.
    Integer(i64),
    /// Arbitrary JSON.
    Json(serde_json::Value),
    /// A failure notice addressed to an error handler.
    Failure(Box<FailureNotice>),
}

impl Payload {
    /// Returns the built-in tag matching this payload's shape.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::Text(_) => TypeTag::TEXT,
            Self::Bytes(_) => TypeTag::BYTES,
            Self::Integer(_) => TypeTag::INTEGER,
            Self::Json(_) => TypeTag::JSON,
            Self::Failure(_) => TypeTag::FAILURE,
        }
    }

    /// Returns true for the null payload.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Json(serde_json::Value::Null))
    }

    /// Returns the text, if this is a text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the bytes, if this is a bytes payload.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer payload.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the JSON value, if this is a JSON payload.
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the failure notice, if this is a failure payload.
    #[must_use]
    pub fn as_failure(&self) -> Option<&FailureNotice> {
        match self {
            Self::Failure(notice) => Some(notice),
            _ => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<FailureNotice> for Payload {
    fn from(notice: FailureNotice) -> Self {
        Self::Failure(Box::new(notice))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
