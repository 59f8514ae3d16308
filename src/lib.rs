//! # bookchain
//!
//! Assemble and run chains of byte-stream transformations over a book.
//!
//! A chain converts one document from one representation to another by
//! passing it through an ordered list of stages. The list is chosen per
//! document at runtime from a [`StageRegistry`], so the same engine can drive
//! differently assembled chains for different books and formats.
//!
//! ## Chain Overview
//!
//! ```text
//! source ──▶ stage #0 ──▶ stage #1 ──▶ … ──▶ stage #n ──▶ target
//!                     conn         conn
//! ```
//!
//! Interior connections are either bounded in-memory pipes (concurrent mode,
//! all stages run as tokio tasks at once) or intermediate files next to the
//! original file (sequential mode, one stage after another). Every stage and
//! every connection is created before the first stage runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bookchain::{BookChain, Book, ChainConfig, StageDescriptor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let book = Arc::new(Book::new("Java ist auch eine Insel").with_language("de"));
//!     let config = ChainConfig::builder().concurrent(true).build()?;
//!     let chain = BookChain::from_paths(
//!         book,
//!         "index.htm",
//!         "index.htm",
//!         "index.md",
//!         config,
//!         StageDescriptor::parse_list("clean,front-matter"),
//!     )?;
//!     let report = chain.run().await?;
//!     eprintln!("{} stages in {}ms", report.stages.len(), report.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bookchain` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod book;
pub mod chain;
pub mod config;
pub mod error;
pub mod progress;
pub mod registry;
pub mod stage;
pub mod stages;
pub mod wire;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use book::Book;
pub use chain::{BookChain, ChainMode, ChainReport, ChainRun, RunningChain, StageReport};
pub use config::{ChainConfig, ChainConfigBuilder, StagedNaming, DEFAULT_PIPE_CAPACITY};
pub use error::{ChainError, ErrorKind, StageError};
pub use progress::{ChainProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{StageConstructor, StageEntry, StageRegistry};
pub use stage::{Stage, StageContext, StageDescriptor, StageKind, StageReader, StageWriter};
pub use stages::builtin_registry;
pub use wire::{ConnectionKind, StageLink, StreamWirer};
