//! Declared type tags for stage inputs and outputs.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A declared payload type.
///
/// Every registered stage type carries an input and an output tag, and
/// topology checks compare tags with plain equality. Custom tags name
/// application-level shapes carried in [`Payload::Json`](super::Payload::Json).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    /// UTF-8 text.
    pub const TEXT: Self = Self(Cow::Borrowed("text"));
    /// Raw bytes.
    pub const BYTES: Self = Self(Cow::Borrowed("bytes"));
    /// Signed 64-bit integers.
    pub const INTEGER: Self = Self(Cow::Borrowed("integer"));
    /// Arbitrary JSON.
    pub const JSON: Self = Self(Cow::Borrowed("json"));
    /// Failure notices, the input of every error handler.
    pub const FAILURE: Self = Self(Cow::Borrowed("failure"));

    /// Creates a custom tag.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the tag name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeTag {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tags_compare_by_name() {
        assert_eq!(TypeTag::TEXT, TypeTag::new("text"));
        assert_ne!(TypeTag::TEXT, TypeTag::BYTES);
    }

    #[test]
    fn test_type_tag_serializes_as_string() {
        let json = serde_json::to_string(&TypeTag::new("order")).unwrap();
        assert_eq!(json, r#""order""#);

        let tag: TypeTag = serde_json::from_str(r#""failure""#).unwrap();
        assert_eq!(tag, TypeTag::FAILURE);
    }
}
