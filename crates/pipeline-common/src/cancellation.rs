//! Run-wide cancellation signal.
//!
//! A single [`CancellationToken`] is shared by every stage of a run. Cancelling
//! it is idempotent and may happen from any thread; every blocking wait inside
//! a stage goes through [`race`] so that a cancelled run unwinds without
//! leaving workers parked on a channel.

use std::future::Future;

pub use tokio_util::sync::CancellationToken;

/// Drive `fut` until it completes or `token` is cancelled, whichever is first.
///
/// Returns `None` when cancellation won. When both are ready on the same poll the
/// token wins, so a cancelled worker never completes one more send.
pub async fn race<F>(token: &CancellationToken, fut: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = fut => Some(output),
    }
}
