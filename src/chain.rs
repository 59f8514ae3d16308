//! Chain construction and execution.
//!
//! A [`BookChain`] owns one conversion request: the book, the original file,
//! the source and target streams, the configuration and the ordered stage
//! list. [`BookChain::execute`] runs it in two strictly separated phases.
//!
//! ## Wiring
//!
//! The stage list is drained front to back. For each stage the registry entry
//! is resolved, the [`StreamWirer`] binds its input and output, and the
//! registry constructs the stage. Nothing runs yet. A stage further down the
//! chain never exists without its upstream connection, and no stage writes
//! into a pipe whose reader has not been created.
//!
//! ## Running
//!
//! * **sequential**: each stage runs to completion before the next starts.
//!   The intermediate files make this safe: nobody waits on a full buffer.
//! * **concurrent**: every stage is spawned as its own tokio task and
//!   `execute` returns a [`RunningChain`] right away. Await it with
//!   [`RunningChain::wait`] to learn about completion and failures.

use crate::book::Book;
use crate::config::ChainConfig;
use crate::error::{ChainError, StageError};
use crate::progress::ProgressCallback;
use crate::registry::StageRegistry;
use crate::stage::{Stage, StageDescriptor, StageReader, StageWriter};
use crate::stages::builtin_registry;
use crate::wire::StreamWirer;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How the stages of a chain were executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainMode {
    Sequential,
    Concurrent,
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub position: usize,
    pub name: String,
    pub duration_ms: u64,
}

/// Summary of a finished chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub mode: ChainMode,
    /// One entry per stage, in chain order.
    pub stages: Vec<StageReport>,
    /// Intermediate files written in staged mode, in chain order.
    pub staged_files: Vec<PathBuf>,
    pub wiring_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A stage bound to its streams, waiting to run.
struct WiredStage {
    position: usize,
    name: String,
    stage: Box<dyn Stage>,
}

/// One document conversion: a book, its streams and the stages between them.
pub struct BookChain {
    book: Arc<Book>,
    original_file: Arc<Path>,
    source: StageReader,
    target: StageWriter,
    config: ChainConfig,
    stages: VecDeque<StageDescriptor>,
    registry: Arc<StageRegistry>,
}

impl BookChain {
    /// Build a chain over two already-open streams.
    ///
    /// `original_file` is only used to name intermediate files in staged mode
    /// and is handed to every stage. Uses the built-in stage registry; see
    /// [`BookChain::with_registry`].
    pub fn new(
        book: Arc<Book>,
        original_file: impl AsRef<Path>,
        source: StageReader,
        target: StageWriter,
        config: ChainConfig,
        stages: impl IntoIterator<Item = StageDescriptor>,
    ) -> Self {
        Self {
            book,
            original_file: Arc::from(original_file.as_ref()),
            source,
            target,
            config,
            stages: stages.into_iter().collect(),
            registry: Arc::new(builtin_registry()),
        }
    }

    /// Build a chain reading `source_path` and writing `target_path`.
    ///
    /// The target is created (or truncated) right away.
    pub fn from_paths(
        book: Arc<Book>,
        original_file: impl AsRef<Path>,
        source_path: impl AsRef<Path>,
        target_path: impl AsRef<Path>,
        config: ChainConfig,
        stages: impl IntoIterator<Item = StageDescriptor>,
    ) -> Result<Self, ChainError> {
        let source_path = source_path.as_ref();
        let target_path = target_path.as_ref();

        let source = std::fs::File::open(source_path).map_err(|e| ChainError::OpenFailed {
            path: source_path.to_path_buf(),
            source: e,
        })?;
        let target = std::fs::File::create(target_path).map_err(|e| ChainError::CreateFailed {
            path: target_path.to_path_buf(),
            source: e,
        })?;

        Ok(Self::new(
            book,
            original_file,
            Box::new(tokio::fs::File::from_std(source)),
            Box::new(tokio::fs::File::from_std(target)),
            config,
            stages,
        ))
    }

    /// Resolve stages against `registry` instead of the built-in one.
    pub fn with_registry(mut self, registry: Arc<StageRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Number of stages still queued.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Wire every stage, then run them.
    ///
    /// Sequential chains return [`ChainRun::Completed`] once the last stage has
    /// finished. Concurrent chains return [`ChainRun::Running`] as soon as every
    /// stage has been spawned; the stages are still running at that point.
    ///
    /// # Errors
    /// Configuration and I/O errors abort wiring before any stage runs. In
    /// sequential mode the first failing stage stops the chain and is returned
    /// as [`ChainError::StageFailed`].
    pub async fn execute(self) -> Result<ChainRun, ChainError> {
        let started = Instant::now();
        let BookChain {
            book,
            original_file,
            source,
            target,
            config,
            mut stages,
            registry,
        } = self;

        if stages.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        let total = stages.len();
        let mode = if config.concurrent {
            ChainMode::Concurrent
        } else {
            ChainMode::Sequential
        };
        let progress = config.progress_callback.clone();
        info!(
            "Wiring {} stages ({:?}) for '{}'",
            total,
            mode,
            original_file.display()
        );

        // ── Phase 1: wiring ──────────────────────────────────────────────
        let mut wirer = StreamWirer::new(source, target, &config, Arc::clone(&original_file));
        let mut wired: Vec<WiredStage> = Vec::with_capacity(total);
        let mut position = 0;

        while let Some(descriptor) = stages.pop_front() {
            let extension = registry.resolve(&descriptor)?.require_extension()?;
            let link = wirer.connect(stages.is_empty(), extension).await?;
            if let (Some(cb), Some(kind)) = (&progress, &link.connection) {
                cb.on_connection_created(position, kind);
            }

            let stage = registry.create(
                &descriptor,
                link.input,
                link.output,
                Arc::clone(&book),
                Arc::clone(&original_file),
            )?;
            if let Some(ref cb) = progress {
                cb.on_stage_wired(position, descriptor.name());
            }
            wired.push(WiredStage {
                position,
                name: descriptor.name().to_string(),
                stage,
            });
            position += 1;
        }

        let staged_files = wirer.into_staged_files();
        let wiring_duration_ms = started.elapsed().as_millis() as u64;
        debug!("Wired {} stages in {}ms", wired.len(), wiring_duration_ms);
        if let Some(ref cb) = progress {
            cb.on_wiring_complete(wired.len());
        }

        // ── Phase 2: running ─────────────────────────────────────────────
        if config.concurrent {
            let mut tasks = JoinSet::new();
            for w in wired {
                tasks.spawn(run_stage(w, progress.clone()));
            }
            info!("Launched {} concurrent stages", total);
            return Ok(ChainRun::Running(RunningChain {
                tasks,
                total,
                fail_fast: config.fail_fast,
                progress,
                staged_files,
                wiring_duration_ms,
                started,
            }));
        }

        let mut reports = Vec::with_capacity(total);
        for w in wired {
            let outcome = run_stage(w, progress.clone()).await;
            match outcome.result {
                Ok(()) => reports.push(outcome.report()),
                Err(source) => {
                    if let Some(ref cb) = progress {
                        cb.on_chain_complete(total, reports.len());
                    }
                    return Err(ChainError::StageFailed {
                        position: outcome.position,
                        stage: outcome.name,
                        source,
                    });
                }
            }
        }

        if let Some(ref cb) = progress {
            cb.on_chain_complete(total, reports.len());
        }
        let total_duration_ms = started.elapsed().as_millis() as u64;
        info!("Chain complete: {} stages in {}ms", total, total_duration_ms);

        Ok(ChainRun::Completed(ChainReport {
            mode,
            stages: reports,
            staged_files,
            wiring_duration_ms,
            total_duration_ms,
        }))
    }

    /// Execute the chain and wait until every stage has finished.
    pub async fn run(self) -> Result<ChainReport, ChainError> {
        self.execute().await?.wait().await
    }

    /// Synchronous wrapper around [`BookChain::run`].
    ///
    /// Creates a temporary tokio runtime internally. Concurrent chains are
    /// awaited before returning since dropping the runtime would cancel them.
    pub fn run_sync(self) -> Result<ChainReport, ChainError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ChainError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run())
    }
}

/// What [`BookChain::execute`] hands back.
#[must_use = "a concurrent chain reports failures only through `wait`"]
pub enum ChainRun {
    /// Sequential chain; every stage has finished.
    Completed(ChainReport),
    /// Concurrent chain; stages are running.
    Running(RunningChain),
}

impl ChainRun {
    pub fn is_running(&self) -> bool {
        matches!(self, ChainRun::Running(_))
    }

    /// Wait for the chain to finish. Returns immediately for sequential chains.
    pub async fn wait(self) -> Result<ChainReport, ChainError> {
        match self {
            ChainRun::Completed(report) => Ok(report),
            ChainRun::Running(running) => running.wait().await,
        }
    }
}

/// Handle on the tasks of a concurrent chain.
///
/// Stages run to completion whether or not the handle is kept. Dropping it
/// only gives up on observing them; call [`RunningChain::wait`] to learn about
/// failures.
#[must_use = "stage failures are only reported through `wait`"]
pub struct RunningChain {
    tasks: JoinSet<StageOutcome>,
    total: usize,
    fail_fast: bool,
    progress: Option<ProgressCallback>,
    staged_files: Vec<PathBuf>,
    wiring_duration_ms: u64,
    started: Instant,
}

impl RunningChain {
    /// Number of stages not yet collected.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Let the stages run to completion in the background without observing them.
    ///
    /// Same as dropping the handle.
    pub fn detach(self) {
        drop(self);
    }

    /// Await every stage.
    ///
    /// With `fail_fast` the first failure aborts the remaining stages and is
    /// returned on its own. Without it every stage is awaited; a single
    /// failure is returned as [`ChainError::StageFailed`], several as
    /// [`ChainError::Aggregate`] ordered by chain position.
    pub async fn wait(mut self) -> Result<ChainReport, ChainError> {
        let mut reports = Vec::with_capacity(self.total);
        let mut failures: Vec<ChainError> = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    self.tasks.abort_all();
                    return Err(ChainError::Internal(format!("Stage task failed: {e}")));
                }
            };
            match outcome.result {
                Ok(()) => reports.push(StageReport {
                    position: outcome.position,
                    name: outcome.name,
                    duration_ms: outcome.elapsed_ms,
                }),
                Err(source) => {
                    failures.push(ChainError::StageFailed {
                        position: outcome.position,
                        stage: outcome.name,
                        source,
                    });
                    if self.fail_fast {
                        let remaining = self.tasks.len();
                        if remaining > 0 {
                            warn!("Aborting {} remaining stages", remaining);
                        }
                        self.tasks.abort_all();
                        while self.tasks.join_next().await.is_some() {}
                        break;
                    }
                }
            }
        }

        if let Some(ref cb) = self.progress {
            cb.on_chain_complete(self.total, reports.len());
        }

        if !failures.is_empty() {
            if failures.len() == 1 {
                return Err(failures.remove(0));
            }
            failures.sort_by_key(|f| match f {
                ChainError::StageFailed { position, .. } => *position,
                _ => usize::MAX,
            });
            return Err(ChainError::Aggregate { failures });
        }

        reports.sort_by_key(|r| r.position);
        let total_duration_ms = self.started.elapsed().as_millis() as u64;
        info!(
            "Chain complete: {} stages in {}ms",
            self.total, total_duration_ms
        );
        Ok(ChainReport {
            mode: ChainMode::Concurrent,
            stages: reports,
            staged_files: std::mem::take(&mut self.staged_files),
            wiring_duration_ms: self.wiring_duration_ms,
            total_duration_ms,
        })
    }
}

impl Drop for RunningChain {
    fn drop(&mut self) {
        let remaining = self.tasks.len();
        if remaining > 0 {
            debug!("Detaching {} unobserved stages", remaining);
        }
        self.tasks.detach_all();
    }
}

/// Result of running one wired stage.
struct StageOutcome {
    position: usize,
    name: String,
    elapsed_ms: u64,
    result: Result<(), StageError>,
}

impl StageOutcome {
    fn report(&self) -> StageReport {
        StageReport {
            position: self.position,
            name: self.name.clone(),
            duration_ms: self.elapsed_ms,
        }
    }
}

/// Run one stage, turning a panic into [`StageError::Panicked`].
async fn run_stage(wired: WiredStage, progress: Option<ProgressCallback>) -> StageOutcome {
    let WiredStage {
        position,
        name,
        stage,
    } = wired;

    if let Some(ref cb) = progress {
        cb.on_stage_start(position, &name);
    }
    debug!("Running stage #{} '{}'", position, name);
    let start = Instant::now();

    let result = AssertUnwindSafe(async move { stage.run().await })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(StageError::Panicked(panic_message(payload))));
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match &result {
        Ok(()) => {
            info!("Stage #{} '{}' finished in {}ms", position, name, elapsed_ms);
            if let Some(ref cb) = progress {
                cb.on_stage_complete(position, &name, elapsed_ms);
            }
        }
        Err(e) => {
            warn!("Stage #{} '{}' failed: {}", position, name, e);
            if let Some(ref cb) = progress {
                cb.on_stage_error(position, &name, &e.to_string());
            }
        }
    }

    StageOutcome {
        position,
        name,
        elapsed_ms,
        result,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
