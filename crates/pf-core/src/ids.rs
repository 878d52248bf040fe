//! Identifiers used to address files and batch runs.
//!
//! A [`FileId`] is derived from a file's name and its position in the batch,
//! so two files with the same name submitted together stay distinct. A
//! [`BatchId`] is a random UUID attached to log spans for one run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of one file within a batch, rendered as `"{name}-{index}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Build the id for the file named `name` at position `index`.
    #[must_use]
    pub fn new(name: &str, index: usize) -> Self {
        Self(format!("{name}-{index}"))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Random identifier for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Create a new random ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return the inner UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_combines_name_and_index() {
        let id = FileId::new("holiday.jpg", 3);
        assert_eq!(id.as_str(), "holiday.jpg-3");
        assert_eq!(id.to_string(), "holiday.jpg-3");
    }

    #[test]
    fn same_name_different_index_differs() {
        assert_ne!(FileId::new("a.png", 0), FileId::new("a.png", 1));
    }

    #[test]
    fn file_id_parses_back() {
        let id: FileId = "a.png-1".parse().unwrap();
        assert_eq!(id, FileId::new("a.png", 1));
    }

    #[test]
    fn file_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&FileId::new("x.gif", 7)).unwrap();
        assert_eq!(json, "\"x.gif-7\"");
    }

    #[test]
    fn batch_ids_are_unique() {
        assert_ne!(BatchId::new(), BatchId::new());
    }
}
