//! Progress accounting shared by every stage of a run.
//!
//! The tracker knows the expected number of units up front and counts completed
//! units by terminal status. Counters are atomics so workers on any thread can
//! advance it; an optional callback observes every advance (used by the CLI to
//! drive a progress bar).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Terminal status of the units retired by one progress advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitStatus {
    /// Unit reached its terminal success state.
    Succeeded,
    /// Unit was intentionally not produced (not a failure).
    Skipped,
    /// Unit failed or was preempted by an upstream failure.
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Succeeded => write!(f, "succeeded"),
            UnitStatus::Skipped => write!(f, "skipped"),
            UnitStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Emitted to the progress callback after every advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Units retired by this advance.
    pub units: u64,
    /// Status of the retired units.
    pub status: UnitStatus,
    /// Total completed units after this advance.
    pub completed: u64,
    /// Expected total for the run.
    pub expected: u64,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync + 'static>;

/// Point-in-time copy of the tracker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub expected: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.expected
    }
}

struct Counters {
    expected: u64,
    completed: AtomicU64,
    succeeded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    callback: Option<ProgressCallback>,
}

/// Cheaply clonable handle to the run's progress counters.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Counters>,
}

impl ProgressTracker {
    pub fn new(expected: u64) -> Self {
        Self::build(expected, None)
    }

    pub fn with_callback(expected: u64, callback: ProgressCallback) -> Self {
        Self::build(expected, Some(callback))
    }

    fn build(expected: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            inner: Arc::new(Counters {
                expected,
                completed: AtomicU64::new(0),
                succeeded: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                callback,
            }),
        }
    }

    /// Retire `units` with the given terminal status.
    pub fn advance(&self, units: u64, status: UnitStatus) {
        if units == 0 {
            return;
        }

        let bucket = match status {
            UnitStatus::Succeeded => &self.inner.succeeded,
            UnitStatus::Skipped => &self.inner.skipped,
            UnitStatus::Failed => &self.inner.failed,
        };
        bucket.fetch_add(units, Ordering::Relaxed);
        let completed = self.inner.completed.fetch_add(units, Ordering::AcqRel) + units;

        if let Some(callback) = &self.inner.callback {
            callback(ProgressEvent {
                units,
                status,
                completed,
                expected: self.inner.expected,
            });
        }
    }

    pub fn expected(&self) -> u64 {
        self.inner.expected
    }

    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            expected: self.inner.expected,
            completed: self.completed(),
            succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            skipped: self.inner.skipped.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("snapshot", &self.snapshot())
            .field("has_callback", &self.inner.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn advance_updates_buckets_and_total() {
        let tracker = ProgressTracker::new(6);
        tracker.advance(1, UnitStatus::Succeeded);
        tracker.advance(2, UnitStatus::Failed);
        tracker.advance(1, UnitStatus::Skipped);
        tracker.advance(0, UnitStatus::Failed);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 4);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.skipped, 1);
        assert!(!snapshot.is_complete());
    }

    #[test]
    fn callback_sees_running_total() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tracker = ProgressTracker::with_callback(
            3,
            Arc::new(move |event: ProgressEvent| sink.lock().unwrap().push(event.completed)),
        );

        tracker.advance(2, UnitStatus::Failed);
        tracker.advance(1, UnitStatus::Succeeded);

        assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
        assert!(tracker.snapshot().is_complete());
    }

    #[test]
    fn concurrent_advances_are_not_lost() {
        let tracker = ProgressTracker::new(8_000);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let tracker = tracker.clone();
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        tracker.advance(1, UnitStatus::Succeeded);
                    }
                });
            }
        });
        assert_eq!(tracker.completed(), 8_000);
    }
}
