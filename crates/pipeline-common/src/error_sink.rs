//! Fan-in channel collecting per-item failures from every stage.
//!
//! Producers never hold the sink directly; they report through an
//! [`AbortAccountant`](crate::AbortAccountant) created from it. A single
//! [`ErrorReporter`] task drains the channel until the last sender is gone.

use tokio::task::JoinHandle;
use tracing::debug;

use crate::accountant::AbortAccountant;
use crate::progress::ProgressTracker;

/// Owning end of the error channel held by the orchestrator.
pub struct ErrorSink<E> {
    tx: flume::Sender<E>,
}

/// Create an unbuffered error sink and its receiving end.
pub fn error_sink<E>() -> (ErrorSink<E>, flume::Receiver<E>) {
    let (tx, rx) = flume::bounded(0);
    (ErrorSink { tx }, rx)
}

impl<E> ErrorSink<E> {
    /// Create an accountant that retires `retire` progress units per reported error.
    pub fn accountant(&self, retire: u64, progress: ProgressTracker) -> AbortAccountant<E> {
        AbortAccountant::new(retire, progress, self.tx.clone())
    }

    /// Release the orchestrator's sender.
    ///
    /// Once every accountant is dropped as well, the reporter drains what is left
    /// and exits.
    pub fn close(self) {
        debug!(
            remaining_senders = self.tx.sender_count().saturating_sub(1),
            "Closing error sink"
        );
    }
}

/// Single consumer draining the error sink.
///
/// The reporter folds every error into a value of type `R`; the plain
/// [`ErrorReporter::spawn`] form just counts them.
pub struct ErrorReporter<R = usize> {
    handle: JoinHandle<R>,
}

impl ErrorReporter {
    /// Spawn the reporting task; `handler` is invoked once per error, in arrival order.
    pub fn spawn<E, F>(rx: flume::Receiver<E>, mut handler: F) -> Self
    where
        E: Send + 'static,
        F: FnMut(E) + Send + 'static,
    {
        ErrorReporter::fold(rx, 0usize, move |reported, error| {
            handler(error);
            *reported += 1;
        })
    }
}

impl<R: Default + Send + 'static> ErrorReporter<R> {
    /// Spawn a reporting task accumulating every error into `init`.
    pub fn fold<E, F>(rx: flume::Receiver<E>, init: R, mut fold: F) -> Self
    where
        E: Send + 'static,
        F: FnMut(&mut R, E) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut acc = init;
            let mut reported = 0usize;
            while let Ok(error) = rx.recv_async().await {
                fold(&mut acc, error);
                reported += 1;
            }
            debug!(reported, "Error reporter drained");
            acc
        });
        Self { handle }
    }

    /// Wait for the reporter to finish draining and return what it accumulated.
    pub async fn finish(self) -> R {
        self.handle.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn reporter_drains_until_all_senders_are_gone() {
        let (sink, rx) = error_sink::<String>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let reporter = {
            let seen = seen.clone();
            ErrorReporter::spawn(rx, move |e| seen.lock().unwrap().push(e))
        };

        let progress = ProgressTracker::new(2);
        let accountant = sink.accountant(1, progress.clone());
        let token = crate::CancellationToken::new();

        accountant.report("first".to_string(), &token).await.unwrap();
        accountant.report("second".to_string(), &token).await.unwrap();

        drop(accountant);
        sink.close();

        assert_eq!(reporter.finish().await, 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(progress.completed(), 2);
    }

    #[tokio::test]
    async fn fold_collects_messages() {
        let (sink, rx) = error_sink::<u32>();
        let reporter = ErrorReporter::fold(rx, Vec::new(), |seen: &mut Vec<String>, code| {
            seen.push(format!("code {code}"))
        });

        let accountant = sink.accountant(2, ProgressTracker::new(4));
        let token = crate::CancellationToken::new();
        accountant.report(7, &token).await.unwrap();
        accountant.report(9, &token).await.unwrap();
        drop(accountant);
        sink.close();

        assert_eq!(reporter.finish().await, vec!["code 7", "code 9"]);
    }
}
