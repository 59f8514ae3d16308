//! Progress-callback trait for chain wiring and execution events.
//!
//! Inject an [`Arc<dyn ChainProgressCallback>`] via
//! [`crate::config::ChainConfigBuilder::progress_callback`] to receive
//! events while a chain is wired and run.
//!
//! Events arrive in two phases. First every `on_connection_created` and
//! `on_stage_wired` of the wiring phase, closed by one
//! `on_wiring_complete`. Only then do `on_stage_start`,
//! `on_stage_complete` and `on_stage_error` follow.
//!
//! # Example
//!
//! ```rust
//! use bookchain::{ChainConfig, ChainProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl ChainProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, position: usize, stage: &str, elapsed_ms: u64) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("#{position} {stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { finished: AtomicUsize::new(0) });
//!
//! let config = ChainConfig::builder()
//!     .progress_callback(counter as Arc<dyn ChainProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::wire::ConnectionKind;
use std::sync::Arc;

/// Called by the chain engine while it wires and runs stages.
///
/// Implementations must be `Send + Sync`: in concurrent mode the stage
/// events fire from whichever tokio worker runs the stage. All methods
/// default to no-ops.
pub trait ChainProgressCallback: Send + Sync {
    /// An interior connection was created between `position` and `position + 1`.
    fn on_connection_created(&self, position: usize, kind: &ConnectionKind) {
        let _ = (position, kind);
    }

    /// The stage at `position` was constructed with its input and output bound.
    fn on_stage_wired(&self, position: usize, stage: &str) {
        let _ = (position, stage);
    }

    /// Every stage of the chain has been wired; nothing has run yet.
    fn on_wiring_complete(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// The stage at `position` is about to run.
    fn on_stage_start(&self, position: usize, stage: &str) {
        let _ = (position, stage);
    }

    /// The stage at `position` finished without error.
    fn on_stage_complete(&self, position: usize, stage: &str, elapsed_ms: u64) {
        let _ = (position, stage, elapsed_ms);
    }

    /// The stage at `position` failed.
    fn on_stage_error(&self, position: usize, stage: &str, error: &str) {
        let _ = (position, stage, error);
    }

    /// Sequential chains: after the last stage. Concurrent chains: after
    /// `wait()` has collected every stage.
    fn on_chain_complete(&self, total_stages: usize, success_count: usize) {
        let _ = (total_stages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ChainProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ChainConfig`].
pub type ProgressCallback = Arc<dyn ChainProgressCallback>;
