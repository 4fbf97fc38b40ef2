//! # Pipeline Common
//!
//! This crate provides the building blocks for bounded, cancellable multi-stage
//! worker pipelines. Each stage runs a pool of workers that pull from one input
//! channel and push to at most one output channel, with every blocking point raced
//! against a shared cancellation token.
//!
//! ## Features
//!
//! - Generic `Processor` trait covering 1-to-1 and 1-to-N stages
//! - `Stage` runner with a per-stage `CompletionBarrier` that closes the stage
//!   output exactly once, after every worker has exited
//! - Fan-in `ErrorSink` drained by a single reporter task
//! - `AbortAccountant` that retires progress units for work a failure preempts
//! - Lock-free `ProgressTracker` with an optional callback
//!
//! ## License
//!
//! MIT License
//!
//! ## Authors
//!
//! - hua0512
//!

use thiserror::Error;

pub mod accountant;
pub mod barrier;
pub mod cancellation;
pub mod config;
pub mod error_sink;
pub mod progress;
pub mod stage;
#[cfg(test)]
mod test_utils;

/// Re-export key traits and types
pub use accountant::AbortAccountant;
pub use barrier::{CompletionBarrier, StageReport};
pub use cancellation::{CancellationToken, race};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error_sink::{ErrorReporter, ErrorSink, error_sink};
pub use progress::{ProgressCallback, ProgressEvent, ProgressSnapshot, ProgressTracker, UnitStatus};
pub use stage::{Processor, Stage, StageContext, StageOutput, spawn_source};

/// Common error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Worker panicked ({stage}): {reason}")]
    WorkerPanicked { stage: &'static str, reason: String },
}

impl PipelineError {
    /// Map a failed `spawn_blocking`/task join into a pipeline error.
    pub fn from_join(stage: &'static str, error: tokio::task::JoinError) -> Self {
        if error.is_cancelled() {
            PipelineError::Cancelled
        } else {
            PipelineError::WorkerPanicked {
                stage,
                reason: error.to_string(),
            }
        }
    }
}
