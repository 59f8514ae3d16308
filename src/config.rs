//! Configuration types for running a stage chain.
//!
//! Every knob of the engine lives in [`ChainConfig`], built via its
//! [`ChainConfigBuilder`]. The stage list itself is not part of the config:
//! it is passed to [`crate::chain::BookChain::new`] per document, so one
//! config can drive differently assembled chains.

use crate::error::ChainError;
use crate::progress::{ChainProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default capacity, in bytes, of an in-memory connection between two stages.
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// Configuration for a chain run.
///
/// Built via [`ChainConfig::builder()`] or using [`ChainConfig::default()`].
///
/// # Example
/// ```rust
/// use bookchain::{ChainConfig, StagedNaming};
///
/// let config = ChainConfig::builder()
///     .concurrent(true)
///     .pipe_capacity(8 * 1024)
///     .staged_naming(StagedNaming::Positional)
///     .build()
///     .unwrap();
/// assert!(config.concurrent);
/// ```
#[derive(Clone)]
pub struct ChainConfig {
    /// Run every stage as its own task connected by in-memory pipes. Default: false.
    ///
    /// When false, stages run one after another and hand data over through
    /// intermediate files next to the original file. Those files stay on disk
    /// after the run and can be inspected.
    pub concurrent: bool,

    /// Buffer size of each in-memory connection, in bytes. Default: 64 KiB.
    ///
    /// A writer that fills the buffer parks until the downstream stage reads.
    /// Only used in concurrent mode.
    pub pipe_capacity: usize,

    /// How intermediate files are named in staged mode. Default: [`StagedNaming::Extension`].
    pub staged_naming: StagedNaming,

    /// On the first failing stage, abort the siblings still running. Default: true.
    ///
    /// Only applies when a concurrent run is awaited with
    /// [`crate::chain::ChainRun::wait`]. With `false` all stages are awaited
    /// and their failures are reported together.
    pub fail_fast: bool,

    /// Optional wiring/execution event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            staged_naming: StagedNaming::default(),
            fail_fast: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("concurrent", &self.concurrent)
            .field("pipe_capacity", &self.pipe_capacity)
            .field("staged_naming", &self.staged_naming)
            .field("fail_fast", &self.fail_fast)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ChainProgressCallback>"),
            )
            .finish()
    }
}

impl ChainConfig {
    /// Create a new builder for `ChainConfig`.
    pub fn builder() -> ChainConfigBuilder {
        ChainConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ChainConfig`].
#[derive(Debug)]
pub struct ChainConfigBuilder {
    config: ChainConfig,
}

impl ChainConfigBuilder {
    pub fn concurrent(mut self, v: bool) -> Self {
        self.config.concurrent = v;
        self
    }

    pub fn pipe_capacity(mut self, bytes: usize) -> Self {
        self.config.pipe_capacity = bytes;
        self
    }

    pub fn staged_naming(mut self, naming: StagedNaming) -> Self {
        self.config.staged_naming = naming;
        self
    }

    pub fn fail_fast(mut self, v: bool) -> Self {
        self.config.fail_fast = v;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ChainProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ChainConfig, ChainError> {
        if self.config.pipe_capacity == 0 {
            return Err(ChainError::InvalidConfig(
                "Pipe capacity must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Naming scheme for intermediate files written in staged mode.
///
/// | Scheme | File for stage `#1` with extension `.tidy` on `book.html` |
/// |--------|------------------------------------------------------------|
/// | `Extension`  | `book.html.tidy`   |
/// | `Positional` | `book.html.1.tidy` |
///
/// `Extension` reproduces the classic layout. Its known limitation: two
/// interior stages of the same type share one file name, so the second one
/// truncates the file the first one is about to write. `Positional` inserts
/// the chain position and never collides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StagedNaming {
    /// `<original><extension>` (default).
    #[default]
    Extension,
    /// `<original>.<position><extension>`.
    Positional,
}

impl StagedNaming {
    /// Derive the intermediate file written by the stage at `position`.
    pub fn staged_path(&self, original: &Path, position: usize, extension: &str) -> PathBuf {
        let mut name: OsString = original.as_os_str().to_owned();
        if let StagedNaming::Positional = self {
            name.push(format!(".{position}"));
        }
        name.push(extension);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sequential() {
        let c = ChainConfig::default();
        assert!(!c.concurrent);
        assert_eq!(c.pipe_capacity, DEFAULT_PIPE_CAPACITY);
        assert_eq!(c.staged_naming, StagedNaming::Extension);
        assert!(c.fail_fast);
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn builder_rejects_zero_capacity() {
        let err = ChainConfig::builder().pipe_capacity(0).build().unwrap_err();
        assert!(err.to_string().contains("Pipe capacity"), "got: {err}");
    }

    #[test]
    fn builder_sets_fields() {
        let c = ChainConfig::builder()
            .concurrent(true)
            .pipe_capacity(16)
            .staged_naming(StagedNaming::Positional)
            .fail_fast(false)
            .build()
            .unwrap();
        assert!(c.concurrent);
        assert_eq!(c.pipe_capacity, 16);
        assert_eq!(c.staged_naming, StagedNaming::Positional);
        assert!(!c.fail_fast);
    }

    #[test]
    fn extension_naming_appends_extension() {
        let p = StagedNaming::Extension.staged_path(Path::new("/books/java/index.htm"), 3, ".tidy");
        assert_eq!(p, PathBuf::from("/books/java/index.htm.tidy"));
    }

    #[test]
    fn positional_naming_includes_position() {
        let p = StagedNaming::Positional.staged_path(Path::new("/books/java/index.htm"), 3, ".tidy");
        assert_eq!(p, PathBuf::from("/books/java/index.htm.3.tidy"));
    }

    #[test]
    fn extension_naming_collides_for_same_extension() {
        let naming = StagedNaming::Extension;
        let orig = Path::new("book.html");
        assert_eq!(
            naming.staged_path(orig, 1, ".upper"),
            naming.staged_path(orig, 2, ".upper")
        );
    }

    #[test]
    fn debug_hides_callback() {
        let c = ChainConfig::builder()
            .progress_callback(Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn ChainProgressCallback>"), "got: {dbg}");
    }
}
