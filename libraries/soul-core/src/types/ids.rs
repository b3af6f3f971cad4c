/// ID types for Soul Player entities
use crate::error::{Result, SoulError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal values an upstream serializer emits when it stringifies a missing id.
const PLACEHOLDER_IDS: &[&str] = &["undefined", "null"];

/// Track identifier
///
/// Constructed by the data-fetch layer as-is; [`TrackId::parse`] is the
/// validating constructor and [`TrackId::is_usable`] lets consumers reject
/// placeholder values before doing any I/O with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new track ID without validation
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a track ID, rejecting empty and placeholder values
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = Self(id.into());
        if id.is_usable() {
            Ok(id)
        } else {
            Err(SoulError::invalid_input(format!(
                "track id {:?} is empty or a placeholder",
                id.0
            )))
        }
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is a serialized placeholder such as `"undefined"`
    pub fn is_placeholder(&self) -> bool {
        let trimmed = self.0.trim();
        PLACEHOLDER_IDS
            .iter()
            .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
    }

    /// Non-empty and not a placeholder
    pub fn is_usable(&self) -> bool {
        !self.0.trim().is_empty() && !self.is_placeholder()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
