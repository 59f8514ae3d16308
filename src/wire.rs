//! Stream wiring: connect each stage's output to the next stage's input.
//!
//! The wirer walks the chain left to right and is asked once per stage for
//! that stage's input and output. It carries the read end of the previous
//! boundary forward between calls.
//!
//! ```text
//!  source ──▶ #0 ──conn──▶ #1 ──conn──▶ #2 ──▶ target
//! ```
//!
//! The head stage reads the chain's source directly and the tail stage writes
//! the chain's target directly. Every interior boundary gets exactly one
//! connection, created while wiring the upstream stage:
//!
//! * **concurrent**: a bounded in-memory pipe (`tokio::io::duplex`). A
//!   writer that fills the buffer parks until the reader drains it.
//! * **staged**: a file next to the original, named by
//!   [`StagedNaming::staged_path`]. The downstream stage's read handle is
//!   opened as soon as that stage is wired; it sees the bytes once the
//!   upstream stage has shut its output down.

use crate::config::{ChainConfig, StagedNaming};
use crate::error::ChainError;
use crate::stage::{StageReader, StageWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::DuplexStream;
use tracing::{debug, warn};

/// How an interior boundary is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionKind {
    /// In-memory pipe with the given buffer capacity in bytes.
    Pipe { capacity: usize },
    /// Intermediate file on disk.
    File { path: PathBuf },
}

/// Input and output bound for one stage.
pub struct StageLink {
    pub input: StageReader,
    pub output: StageWriter,
    /// The connection created for this stage's output, `None` for the tail.
    pub connection: Option<ConnectionKind>,
}

/// Read end left behind by the previous stage's output.
enum Pending {
    Pipe(DuplexStream),
    File(PathBuf),
}

/// Creates the connections of one chain, one stage at a time.
pub struct StreamWirer {
    source: Option<StageReader>,
    target: Option<StageWriter>,
    concurrent: bool,
    pipe_capacity: usize,
    naming: StagedNaming,
    original_file: Arc<Path>,
    pending: Option<Pending>,
    staged_files: Vec<PathBuf>,
    position: usize,
}

impl StreamWirer {
    pub fn new(
        source: StageReader,
        target: StageWriter,
        config: &ChainConfig,
        original_file: Arc<Path>,
    ) -> Self {
        Self {
            source: Some(source),
            target: Some(target),
            concurrent: config.concurrent,
            pipe_capacity: config.pipe_capacity,
            naming: config.staged_naming,
            original_file,
            pending: None,
            staged_files: Vec::new(),
            position: 0,
        }
    }

    /// Bind the next stage.
    ///
    /// `is_tail` marks the last stage of the chain; `extension` is the stage's
    /// declared file extension, used only when staging to disk.
    pub async fn connect(&mut self, is_tail: bool, extension: &str) -> Result<StageLink, ChainError> {
        let position = self.position;
        let input = self.next_input(position).await?;

        let (output, connection) = if is_tail {
            let target = self.target.take().ok_or_else(|| {
                ChainError::Internal("chain target already handed out".into())
            })?;
            debug!("Stage #{} writes the chain target", position);
            (target, None)
        } else if self.concurrent {
            let (writer, reader) = tokio::io::duplex(self.pipe_capacity);
            self.pending = Some(Pending::Pipe(reader));
            debug!(
                "Stage #{} → #{}: pipe ({} bytes)",
                position,
                position + 1,
                self.pipe_capacity
            );
            (
                Box::new(writer) as StageWriter,
                Some(ConnectionKind::Pipe {
                    capacity: self.pipe_capacity,
                }),
            )
        } else {
            let path = self
                .naming
                .staged_path(&self.original_file, position, extension);
            if self.staged_files.contains(&path) {
                warn!(
                    "Stage #{} reuses intermediate file '{}'; an earlier stage's output will be overwritten",
                    position,
                    path.display()
                );
            }
            let file = tokio::fs::File::create(&path)
                .await
                .map_err(|e| ChainError::CreateFailed {
                    path: path.clone(),
                    source: e,
                })?;
            debug!("Stage #{} → #{}: file '{}'", position, position + 1, path.display());
            self.pending = Some(Pending::File(path.clone()));
            self.staged_files.push(path.clone());
            (
                Box::new(file) as StageWriter,
                Some(ConnectionKind::File { path }),
            )
        };

        self.position += 1;
        Ok(StageLink {
            input,
            output,
            connection,
        })
    }

    /// Intermediate files created so far, in chain order.
    pub fn staged_files(&self) -> &[PathBuf] {
        &self.staged_files
    }

    pub fn into_staged_files(self) -> Vec<PathBuf> {
        self.staged_files
    }

    async fn next_input(&mut self, position: usize) -> Result<StageReader, ChainError> {
        if position == 0 {
            debug!("Stage #0 reads the chain source");
            return self
                .source
                .take()
                .ok_or_else(|| ChainError::Internal("chain source already handed out".into()));
        }
        match self.pending.take() {
            Some(Pending::Pipe(reader)) => Ok(Box::new(reader)),
            Some(Pending::File(path)) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| ChainError::OpenFailed { path, source: e })?;
                Ok(Box::new(file))
            }
            None => Err(ChainError::Internal(format!(
                "stage #{position} has no upstream connection"
            ))),
        }
    }
}
