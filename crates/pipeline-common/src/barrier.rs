//! Per-stage completion barrier.
//!
//! The barrier owns the stage's worker tasks and the stage's own handle on its
//! output channel. [`CompletionBarrier::wait`] consumes the barrier, so the output
//! is released exactly once and only after every worker has exited; the
//! downstream receive loop then ends on the closed channel.

use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::PipelineError;

/// Summary of one finished stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub workers: usize,
    /// Items taken from the input channel and run through the processor.
    pub processed: usize,
}

pub struct CompletionBarrier<O> {
    stage: &'static str,
    workers: JoinSet<Result<usize, PipelineError>>,
    output: Option<flume::Sender<O>>,
}

impl<O> CompletionBarrier<O> {
    pub(crate) fn new(
        stage: &'static str,
        workers: JoinSet<Result<usize, PipelineError>>,
        output: Option<flume::Sender<O>>,
    ) -> Self {
        Self {
            stage,
            workers,
            output,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Wait for every worker, then close the stage output.
    ///
    /// Semantics:
    /// - Every worker is joined even if an earlier one failed.
    /// - The first worker error (or panic) is returned; cancellation is not an error.
    /// - The output channel is released after the last join, in every case.
    pub async fn wait(mut self) -> Result<StageReport, PipelineError> {
        let workers = self.workers.len();
        let mut processed = 0usize;
        let mut first_error: Option<PipelineError> = None;

        while let Some(joined) = self.workers.join_next().await {
            let result = joined.map_err(|e| PipelineError::from_join(self.stage, e));
            match result {
                Ok(Ok(count)) => processed += count,
                Ok(Err(PipelineError::Cancelled)) | Err(PipelineError::Cancelled) => {}
                Ok(Err(e)) | Err(e) => {
                    error!(stage = self.stage, error = %e, "Stage worker failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        // Every producer of this stage is gone; closing here is the only close.
        drop(self.output.take());
        debug!(stage = self.stage, workers, processed, "Stage completed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(StageReport {
                stage: self.stage,
                workers,
                processed,
            }),
        }
    }
}
