//! The document handed to every stage of a chain.
//!
//! The engine never looks inside a [`Book`]; it only shares one instance
//! (behind an `Arc`) with every stage it constructs. Stages read it for
//! metadata such as the title when they need it (see
//! [`crate::stages::FrontMatter`]).

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Descriptive metadata about the book being converted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Book title.
    pub title: Option<String>,
    /// Author or authors, as a display string.
    pub author: Option<String>,
    /// BCP-47 language tag, e.g. `de` or `en-GB`.
    pub language: Option<String>,
    /// Free-form extra fields, kept sorted for deterministic output.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Book {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Load book metadata from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ChainError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ChainError::InvalidConfig(format!("book metadata in '{}': {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builder_sets_fields() {
        let book = Book::new("Galileo Openbook")
            .with_author("Various")
            .with_language("de")
            .with_meta("isbn", "978-3");
        assert_eq!(book.title.as_deref(), Some("Galileo Openbook"));
        assert_eq!(book.author.as_deref(), Some("Various"));
        assert_eq!(book.language.as_deref(), Some("de"));
        assert_eq!(book.metadata.get("isbn").map(String::as_str), Some("978-3"));
    }

    #[test]
    fn from_json_file_parses_partial_document() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"title": "Java ist auch eine Insel", "author": null, "language": "de"}}"#)
            .unwrap();
        let book = Book::from_json_file(tmp.path()).unwrap();
        assert_eq!(book.title.as_deref(), Some("Java ist auch eine Insel"));
        assert!(book.author.is_none());
        assert!(book.metadata.is_empty());
    }

    #[test]
    fn from_json_file_rejects_garbage() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "not json").unwrap();
        let err = Book::from_json_file(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn from_json_file_missing_is_io() {
        let err = Book::from_json_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}
