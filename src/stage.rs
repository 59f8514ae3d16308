//! The contract every chain stage satisfies.
//!
//! A stage is built from exactly four values (see [`StageContext`]): its
//! input stream, its output stream, the shared [`Book`] and the path of the
//! original file. It then runs once to completion via [`Stage::run`].
//!
//! The run operation owns both streams. It must read the input as far as its
//! transformation needs, write the output, and shut the output down before
//! returning so the next stage sees end-of-stream (in-memory pipe) or a fully
//! flushed file (staged mode). Dropping the output on an error path is enough
//! to close it.
//!
//! Stage types that are known at compile time implement [`StageKind`] on top,
//! which carries the registry name and the default file extension without
//! needing an instance.

use crate::book::Book;
use crate::error::StageError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Input end handed to a stage.
pub type StageReader = Box<dyn AsyncRead + Send + Unpin>;

/// Output end handed to a stage.
pub type StageWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A runnable pipeline stage bound to its input and output.
pub trait Stage: Send + 'static {
    /// Registry name of this stage (for logging and error reports).
    fn name(&self) -> &str;

    /// Transform the whole input into the output, then close both.
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), StageError>>;
}

/// The four values a stage is constructed from.
pub struct StageContext {
    pub input: StageReader,
    pub output: StageWriter,
    pub book: Arc<Book>,
    pub original_file: Arc<Path>,
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("book", &self.book.title)
            .field("original_file", &self.original_file)
            .finish_non_exhaustive()
    }
}

/// Compile-time metadata and construction for a stage type.
///
/// Register implementors with [`crate::registry::StageRegistry::register`].
pub trait StageKind: Stage + Sized {
    /// Name under which the stage is registered and selected.
    const NAME: &'static str;

    /// Default extension, like `".tidy"`, for the intermediate file this stage
    /// writes in staged mode.
    const FILE_EXTENSION: &'static str;

    fn construct(ctx: StageContext) -> Self;
}

/// Selects which registered stage sits at a given chain position.
///
/// The same descriptor may appear several times in one chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageDescriptor(String);

impl StageDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Parse a comma-separated list such as `"clean, upper,reverse"`.
    ///
    /// Blank entries are skipped.
    pub fn parse_list(list: &str) -> Vec<StageDescriptor> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(StageDescriptor::new)
            .collect()
    }
}

impl fmt::Display for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageDescriptor {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl FromStr for StageDescriptor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_skips_blanks() {
        let list = StageDescriptor::parse_list(" clean, upper,,reverse ,");
        let names: Vec<&str> = list.iter().map(StageDescriptor::name).collect();
        assert_eq!(names, vec!["clean", "upper", "reverse"]);
    }

    #[test]
    fn parse_list_keeps_duplicates() {
        let list = StageDescriptor::parse_list("upper,lower,upper");
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], list[2]);
    }

    #[test]
    fn display_is_name() {
        assert_eq!(StageDescriptor::from("front-matter").to_string(), "front-matter");
    }
}
