//! Stage registry: maps stage names to constructors and file extensions.
//!
//! The registry is the factory the chain engine calls for every descriptor.
//! Lookups happen at wiring time, so a chain naming an unknown stage, or a
//! stage registered without an extension, fails before any stage runs.

use crate::book::Book;
use crate::error::ChainError;
use crate::stage::{Stage, StageContext, StageDescriptor, StageKind, StageReader, StageWriter};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Builds a boxed stage from its four construction values.
pub type StageConstructor = Arc<dyn Fn(StageContext) -> Box<dyn Stage> + Send + Sync>;

/// One registered stage type.
#[derive(Clone)]
pub struct StageEntry {
    name: String,
    extension: Option<String>,
    constructor: StageConstructor,
}

impl StageEntry {
    /// Entry for a stage type known at compile time.
    pub fn of<S: StageKind>() -> Self {
        Self {
            name: S::NAME.to_string(),
            extension: Some(S::FILE_EXTENSION.to_string()),
            constructor: Arc::new(|ctx: StageContext| {
                Box::new(S::construct(ctx)) as Box<dyn Stage>
            }),
        }
    }

    /// Entry built from a closure.
    ///
    /// `extension` may be `None`; such an entry is listed but cannot be wired.
    pub fn from_fn<F>(name: impl Into<String>, extension: Option<&str>, constructor: F) -> Self
    where
        F: Fn(StageContext) -> Box<dyn Stage> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            extension: extension.map(str::to_string),
            constructor: Arc::new(constructor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// The declared extension, or a configuration error when there is none.
    pub fn require_extension(&self) -> Result<&str, ChainError> {
        match self.extension.as_deref() {
            Some(ext) if !ext.is_empty() => Ok(ext),
            _ => Err(ChainError::MissingExtension {
                stage: self.name.clone(),
            }),
        }
    }
}

impl fmt::Debug for StageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageEntry")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

/// Name-indexed collection of stage types.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    entries: HashMap<String, StageEntry>,
}

impl StageRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compile-time stage type. Returns false if the name is taken.
    pub fn register<S: StageKind>(&mut self) -> bool {
        self.register_entry(StageEntry::of::<S>())
    }

    /// Register an entry. Returns false if the name is taken.
    pub fn register_entry(&mut self, entry: StageEntry) -> bool {
        if self.entries.contains_key(entry.name()) {
            return false;
        }
        self.entries.insert(entry.name.clone(), entry);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&StageEntry> {
        self.entries.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry for `descriptor` and check it is wireable.
    pub fn resolve(&self, descriptor: &StageDescriptor) -> Result<&StageEntry, ChainError> {
        let entry = self
            .entries
            .get(descriptor.name())
            .ok_or_else(|| ChainError::UnknownStage {
                name: descriptor.name().to_string(),
                known: self.names().join(", "),
            })?;
        entry.require_extension()?;
        Ok(entry)
    }

    /// Construct the stage selected by `descriptor`, bound to the given streams.
    pub fn create(
        &self,
        descriptor: &StageDescriptor,
        input: StageReader,
        output: StageWriter,
        book: Arc<Book>,
        original_file: Arc<Path>,
    ) -> Result<Box<dyn Stage>, ChainError> {
        let entry = self.resolve(descriptor)?;
        debug!("Constructing stage '{}'", entry.name());
        Ok((entry.constructor)(StageContext {
            input,
            output,
            book,
            original_file,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stages::{Passthrough, Uppercase};

    fn empty_io() -> (StageReader, StageWriter) {
        (Box::new(tokio::io::empty()), Box::new(tokio::io::sink()))
    }

    fn ctx_values() -> (Arc<Book>, Arc<Path>) {
        (Arc::new(Book::default()), Arc::from(Path::new("book.html")))
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = StageRegistry::new();
        assert!(registry.register::<Uppercase>());
        assert!(!registry.register::<Uppercase>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn entry_of_carries_extension() {
        let entry = StageEntry::of::<Passthrough>();
        assert_eq!(entry.name(), "copy");
        assert_eq!(entry.extension(), Some(".copy"));
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = StageRegistry::new();
        registry.register::<Uppercase>();
        registry.register::<Passthrough>();
        assert_eq!(registry.names(), vec!["copy", "upper"]);
    }

    #[test]
    fn create_unknown_stage_is_configuration_error() {
        let registry = StageRegistry::new();
        let (input, output) = empty_io();
        let (book, orig) = ctx_values();
        let err = registry
            .create(&StageDescriptor::new("tidy"), input, output, book, orig)
            .err()
            .unwrap();
        assert!(matches!(err, ChainError::UnknownStage { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn create_without_extension_is_configuration_error() {
        let mut registry = StageRegistry::new();
        registry.register_entry(StageEntry::from_fn("bare", None, |ctx| {
            Box::new(Passthrough::construct(ctx)) as Box<dyn Stage>
        }));
        let (input, output) = empty_io();
        let (book, orig) = ctx_values();
        let err = registry
            .create(&StageDescriptor::new("bare"), input, output, book, orig)
            .err()
            .unwrap();
        assert!(matches!(err, ChainError::MissingExtension { ref stage } if stage == "bare"));
    }

    #[test]
    fn empty_extension_counts_as_missing() {
        let entry = StageEntry::from_fn("blank", Some(""), |ctx| {
            Box::new(Passthrough::construct(ctx)) as Box<dyn Stage>
        });
        assert!(entry.require_extension().is_err());
    }

    #[test]
    fn create_builds_named_stage() {
        let mut registry = StageRegistry::new();
        registry.register::<Uppercase>();
        let (input, output) = empty_io();
        let (book, orig) = ctx_values();
        let stage = registry
            .create(&StageDescriptor::new("upper"), input, output, book, orig)
            .unwrap();
        assert_eq!(stage.name(), "upper");
    }
}
