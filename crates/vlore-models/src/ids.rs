//! Creator and video identifiers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque platform video identifier, unique within a creator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Error building a [`CreatorHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("creator handle cannot be empty")]
    Empty,
    #[error("creator handle contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// Normalised creator handle: lowercase, leading '@' stripped.
///
/// Handles name on-disk directories, so path separators and traversal
/// sequences are rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CreatorHandle(String);

impl CreatorHandle {
    /// Normalise and validate a raw handle string.
    pub fn new(raw: &str) -> Result<Self, HandleError> {
        let trimmed = raw.trim().trim_start_matches('@').to_lowercase();
        if trimmed.is_empty() {
            return Err(HandleError::Empty);
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| matches!(c, '/' | '\\' | '\0') || c.is_whitespace())
        {
            return Err(HandleError::InvalidCharacter(bad));
        }
        if trimmed.contains("..") || trimmed.chars().all(|c| c == '.') {
            return Err(HandleError::InvalidCharacter('.'));
        }
        Ok(Self(trimmed))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CreatorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_normalisation() {
        let handle = CreatorHandle::new("@SomeCreator").unwrap();
        assert_eq!(handle.as_str(), "somecreator");

        let handle = CreatorHandle::new("  plain_name  ").unwrap();
        assert_eq!(handle.as_str(), "plain_name");
    }

    #[test]
    fn test_handle_rejects_empty() {
        assert_eq!(CreatorHandle::new(""), Err(HandleError::Empty));
        assert_eq!(CreatorHandle::new("@"), Err(HandleError::Empty));
        assert_eq!(CreatorHandle::new("  "), Err(HandleError::Empty));
    }

    #[test]
    fn test_handle_rejects_path_characters() {
        assert!(CreatorHandle::new("a/b").is_err());
        assert!(CreatorHandle::new("a\\b").is_err());
        assert!(CreatorHandle::new("..").is_err());
        assert!(CreatorHandle::new(".").is_err());
    }

    #[test]
    fn test_video_id_display() {
        let id = VideoId::from("7301234567890");
        assert_eq!(id.to_string(), "7301234567890");
        assert_eq!(id.as_str(), "7301234567890");
    }
}
