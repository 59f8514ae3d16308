//! Error types for the bookchain library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`ChainError`]: **Fatal** for the whole chain. Returned from
//!   [`crate::chain::BookChain::execute`] and friends. Its [`ErrorKind`]
//!   tells configuration mistakes, I/O failures and stage failures apart.
//!
//! * [`StageError`]: what a single [`crate::stage::Stage`] returns from its
//!   run operation. The engine wraps it into [`ChainError::StageFailed`]
//!   together with the stage's name and chain position.
//!
//! Nothing in the engine retries: every error aborts the chain.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`ChainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown stage, missing extension metadata, invalid settings.
    Configuration,
    /// A stream or intermediate file could not be opened or created.
    Io,
    /// A stage failed (or panicked) while running.
    StageExecution,
    /// Runtime plumbing failed (e.g. the tokio runtime could not start).
    Internal,
}

/// All fatal errors returned by the bookchain engine.
#[derive(Debug, Error)]
pub enum ChainError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No stage is registered under the requested name.
    #[error("Unknown stage '{name}'\nRegistered stages: {known}")]
    UnknownStage { name: String, known: String },

    /// The stage is registered but declares no default file extension.
    #[error("Stage '{stage}' declares no file extension and cannot be wired")]
    MissingExtension { stage: String },

    /// The descriptor queue was empty; there is nothing to connect source to target with.
    #[error("Chain has no stages")]
    EmptyChain,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not open a stream for reading.
    #[error("Failed to open '{path}' for reading: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create a stream for writing.
    #[error("Failed to create '{path}' for writing: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Stage execution errors ────────────────────────────────────────────
    /// A stage's run operation returned an error.
    #[error("Stage #{position} '{stage}' failed: {source}")]
    StageFailed {
        position: usize,
        stage: String,
        #[source]
        source: StageError,
    },

    /// More than one concurrently running stage failed.
    #[error("{} stages failed; first: {}", .failures.len(), .failures.first().map(|e| e.to_string()).unwrap_or_default())]
    Aggregate { failures: Vec<ChainError> },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainError {
    /// Classify this error.
    ///
    /// An [`ChainError::Aggregate`] is always a stage-execution error since
    /// it can only be produced by concurrently running stages.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::UnknownStage { .. }
            | ChainError::MissingExtension { .. }
            | ChainError::EmptyChain
            | ChainError::InvalidConfig(_) => ErrorKind::Configuration,
            ChainError::OpenFailed { .. } | ChainError::CreateFailed { .. } => ErrorKind::Io,
            ChainError::StageFailed { .. } | ChainError::Aggregate { .. } => {
                ErrorKind::StageExecution
            }
            ChainError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// An error raised by a stage while transforming its input.
#[derive(Debug, Error)]
pub enum StageError {
    /// Reading the input or writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transformation itself rejected the input.
    #[error("Transformation failed: {0}")]
    Transform(String),

    /// The stage panicked; the payload message is kept when it was a string.
    #[error("Stage panicked: {0}")]
    Panicked(String),
}
