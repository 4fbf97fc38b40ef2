//! Error reporting that keeps the progress total honest.
//!
//! A failure early in the pipeline preempts every downstream unit the item would
//! have produced. The accountant retires that many units as failed before it
//! forwards the error, so an observer comparing completed against expected never
//! stalls short of the total.

use std::fmt;

use crate::PipelineError;
use crate::cancellation::{CancellationToken, race};
use crate::progress::{ProgressTracker, UnitStatus};

pub struct AbortAccountant<E> {
    retire: u64,
    progress: ProgressTracker,
    sink: flume::Sender<E>,
}

impl<E> AbortAccountant<E> {
    pub(crate) fn new(retire: u64, progress: ProgressTracker, sink: flume::Sender<E>) -> Self {
        Self {
            retire,
            progress,
            sink,
        }
    }

    /// Units retired per reported error.
    pub fn retire_count(&self) -> u64 {
        self.retire
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Retire the configured units, then hand `error` to the sink.
    ///
    /// The send is raced against `token`; a cancelled run returns
    /// [`PipelineError::Cancelled`] and the error is dropped.
    pub async fn report(&self, error: E, token: &CancellationToken) -> Result<(), PipelineError> {
        self.progress.advance(self.retire, UnitStatus::Failed);

        match race(token, self.sink.send_async(error)).await {
            None => Err(PipelineError::Cancelled),
            Some(Ok(())) => Ok(()),
            Some(Err(_)) => Err(PipelineError::ChannelClosed("error sink")),
        }
    }
}

impl<E> Clone for AbortAccountant<E> {
    fn clone(&self) -> Self {
        Self {
            retire: self.retire,
            progress: self.progress.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<E> fmt::Debug for AbortAccountant<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortAccountant")
            .field("retire", &self.retire)
            .finish_non_exhaustive()
    }
}
