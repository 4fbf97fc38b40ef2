//! # Stage Runner
//!
//! A stage is a pool of workers sharing one input channel and at most one output
//! channel. Each worker loops: receive an item (or observe the closed input and
//! exit), run the [`Processor`], and route what it produced through a
//! [`StageOutput`]. Every receive and send is raced against the run's
//! cancellation token.
//!
//! ## Usage
//!
//! ```ignore
//! let barrier = Stage::new(MyProcessor)
//!     .workers(4)
//!     .spawn(input_rx, Some(output_tx), StageContext::new(token, accountant));
//! let report = barrier.wait().await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error, trace};

use crate::PipelineError;
use crate::accountant::AbortAccountant;
use crate::barrier::CompletionBarrier;
use crate::cancellation::{CancellationToken, race};
use crate::progress::UnitStatus;

/// Per-item work performed by one stage.
///
/// A processor may emit zero, one or many outputs per input, report a per-item
/// failure through [`StageOutput::fail`], or retire the unit directly with
/// [`StageOutput::complete`]. Returning an error ends the calling worker;
/// [`PipelineError::Cancelled`] ends it quietly.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;
    type Error: Send + 'static;

    fn name(&self) -> &'static str;

    async fn process(
        &self,
        input: Self::Input,
        output: &StageOutput<Self::Output, Self::Error>,
    ) -> Result<(), PipelineError>;
}

/// Run-wide handles a stage needs besides its channels.
pub struct StageContext<E> {
    pub token: CancellationToken,
    pub accountant: AbortAccountant<E>,
}

impl<E> StageContext<E> {
    pub fn new(token: CancellationToken, accountant: AbortAccountant<E>) -> Self {
        Self { token, accountant }
    }
}

/// A worker's view of where processed items go.
pub struct StageOutput<O, E> {
    stage: &'static str,
    sender: Option<flume::Sender<O>>,
    accountant: AbortAccountant<E>,
    token: CancellationToken,
}

impl<O, E> StageOutput<O, E> {
    /// Hand `item` to the downstream stage, waiting until it is taken.
    pub async fn emit(&self, item: O) -> Result<(), PipelineError> {
        let Some(sender) = &self.sender else {
            return Err(PipelineError::ChannelClosed("terminal stage has no output"));
        };

        match race(&self.token, sender.send_async(item)).await {
            None => Err(PipelineError::Cancelled),
            Some(Ok(())) => Ok(()),
            Some(Err(_)) => Err(PipelineError::ChannelClosed("downstream")),
        }
    }

    /// Report a per-item failure; the stage accountant retires its units first.
    pub async fn fail(&self, error: E) -> Result<(), PipelineError> {
        self.accountant.report(error, &self.token).await
    }

    /// Retire one unit that reached a terminal state in this stage.
    pub fn complete(&self, status: UnitStatus) {
        self.accountant.progress().advance(1, status);
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A processor plus the size of the worker pool that will run it.
pub struct Stage<P: Processor> {
    processor: Arc<P>,
    workers: usize,
}

impl<P: Processor> Stage<P> {
    pub fn new(processor: P) -> Self {
        Self {
            processor: Arc::new(processor),
            workers: 1,
        }
    }

    /// Set the pool size; clamped to at least one worker.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn name(&self) -> &'static str {
        self.processor.name()
    }

    /// Start the worker pool.
    ///
    /// `output` is `None` for a terminal stage. The returned barrier must be
    /// awaited; it closes `output` once every worker has exited.
    pub fn spawn(
        self,
        input: flume::Receiver<P::Input>,
        output: Option<flume::Sender<P::Output>>,
        context: StageContext<P::Error>,
    ) -> CompletionBarrier<P::Output> {
        let stage = self.processor.name();
        debug!(stage, workers = self.workers, "Starting stage");

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let handle = StageOutput {
                stage,
                sender: output.clone(),
                accountant: context.accountant.clone(),
                token: context.token.clone(),
            };
            workers.spawn(run_worker(id, self.processor.clone(), input.clone(), handle));
        }

        CompletionBarrier::new(stage, workers, output)
    }
}

async fn run_worker<P: Processor>(
    id: usize,
    processor: Arc<P>,
    input: flume::Receiver<P::Input>,
    output: StageOutput<P::Output, P::Error>,
) -> Result<usize, PipelineError> {
    let stage = output.stage();
    let mut processed = 0usize;
    trace!(stage, worker = id, "Worker started");

    loop {
        let item = match race(output.token(), input.recv_async()).await {
            None => {
                debug!(stage, worker = id, "Worker observed cancellation");
                break;
            }
            // upstream closed: nothing left for this stage
            Some(Err(_)) => break,
            Some(Ok(item)) => item,
        };

        match processor.process(item, &output).await {
            Ok(()) => processed += 1,
            Err(PipelineError::Cancelled) => {
                debug!(stage, worker = id, "Worker cancelled mid-item");
                break;
            }
            Err(e) => {
                error!(stage, worker = id, error = %e, "Processor failed");
                return Err(e);
            }
        }
    }

    trace!(stage, worker = id, processed, "Worker exited");
    Ok(processed)
}

/// Feed `items` one at a time into `output` from a single producer task.
///
/// The returned barrier closes `output` after the last item was taken or the
/// run was cancelled.
pub fn spawn_source<T, I>(
    name: &'static str,
    items: I,
    output: flume::Sender<T>,
    token: CancellationToken,
) -> CompletionBarrier<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = T> + Send + 'static,
    I::IntoIter: Send,
{
    let mut producer = JoinSet::new();
    let tx = output.clone();
    producer.spawn(async move {
        let mut emitted = 0usize;
        for item in items {
            match race(&token, tx.send_async(item)).await {
                None => {
                    debug!(stage = name, emitted, "Source observed cancellation");
                    break;
                }
                Some(Ok(())) => emitted += 1,
                Some(Err(_)) => return Err(PipelineError::ChannelClosed("downstream")),
            }
        }
        Ok(emitted)
    });

    CompletionBarrier::new(name, producer, Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_sink::{ErrorReporter, error_sink};
    use crate::progress::ProgressTracker;
    use crate::test_utils::init_tracing;
    use std::time::Duration;

    struct Doubler;

    #[async_trait]
    impl Processor for Doubler {
        type Input = u64;
        type Output = u64;
        type Error = String;

        fn name(&self) -> &'static str {
            "double"
        }

        async fn process(
            &self,
            input: u64,
            output: &StageOutput<u64, String>,
        ) -> Result<(), PipelineError> {
            output.emit(input * 2).await
        }
    }

    /// Emits `input` copies of each odd number and fails every even one.
    struct Fanout;

    #[async_trait]
    impl Processor for Fanout {
        type Input = u64;
        type Output = u64;
        type Error = String;

        fn name(&self) -> &'static str {
            "fanout"
        }

        async fn process(
            &self,
            input: u64,
            output: &StageOutput<u64, String>,
        ) -> Result<(), PipelineError> {
            if input % 2 == 0 {
                return output.fail(format!("even input {input}")).await;
            }
            for _ in 0..3 {
                output.emit(input).await?;
            }
            Ok(())
        }
    }

    /// Terminal stage retiring one unit per item.
    struct Collect;

    #[async_trait]
    impl Processor for Collect {
        type Input = u64;
        type Output = ();
        type Error = String;

        fn name(&self) -> &'static str {
            "collect"
        }

        async fn process(
            &self,
            _input: u64,
            output: &StageOutput<(), String>,
        ) -> Result<(), PipelineError> {
            output.complete(UnitStatus::Succeeded);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_to_one_stage_processes_everything_and_closes_output() {
        init_tracing();
        let token = CancellationToken::new();
        let (sink, errors) = error_sink::<String>();
        let reporter = ErrorReporter::spawn(errors, |_| {});
        let progress = ProgressTracker::new(0);

        let (in_tx, in_rx) = flume::bounded(0);
        let (out_tx, out_rx) = flume::bounded(0);

        let source = spawn_source("numbers", 1..=50u64, in_tx, token.clone());
        let barrier = Stage::new(Doubler).workers(4).spawn(
            in_rx,
            Some(out_tx),
            StageContext::new(token.clone(), sink.accountant(1, progress)),
        );

        let collector = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Ok(value) = out_rx.recv_async().await {
                seen.push(value);
            }
            seen
        });

        let (source_report, stage_report) = tokio::join!(source.wait(), barrier.wait());
        assert_eq!(source_report.unwrap().processed, 50);
        let stage_report = stage_report.unwrap();
        assert_eq!(stage_report.workers, 4);
        assert_eq!(stage_report.processed, 50);

        let mut seen = collector.await.unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (1..=50u64).map(|n| n * 2).collect::<Vec<_>>());

        sink.close();
        assert_eq!(reporter.finish().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fanout_failures_are_accounted_against_the_expected_total() {
        init_tracing();
        let token = CancellationToken::new();
        let (sink, errors) = error_sink::<String>();
        let reporter = ErrorReporter::spawn(errors, |_| {});

        // 10 inputs, 3 units each
        let progress = ProgressTracker::new(30);
        let (in_tx, in_rx) = flume::bounded(0);
        let (mid_tx, mid_rx) = flume::bounded(0);

        let source = spawn_source("numbers", 1..=10u64, in_tx, token.clone());
        let fanout = Stage::new(Fanout).workers(3).spawn(
            in_rx,
            Some(mid_tx),
            StageContext::new(token.clone(), sink.accountant(3, progress.clone())),
        );
        let collect = Stage::new(Collect).workers(2).spawn(
            mid_rx,
            None,
            StageContext::new(token.clone(), sink.accountant(1, progress.clone())),
        );

        let (a, b, c) = tokio::join!(source.wait(), fanout.wait(), collect.wait());
        a.unwrap();
        b.unwrap();
        assert_eq!(c.unwrap().processed, 15);

        sink.close();
        assert_eq!(reporter.finish().await, 5);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.completed, 30);
        assert_eq!(snapshot.succeeded, 15);
        assert_eq!(snapshot.failed, 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancellation_unwinds_a_stalled_pipeline() {
        init_tracing();
        let token = CancellationToken::new();
        let (sink, errors) = error_sink::<String>();
        let reporter = ErrorReporter::spawn(errors, |_| {});
        let progress = ProgressTracker::new(0);

        let (in_tx, in_rx) = flume::bounded(0);
        // nobody ever reads from this channel
        let (out_tx, _out_rx) = flume::bounded(0);

        let source = spawn_source("numbers", 0..1_000u64, in_tx, token.clone());
        let barrier = Stage::new(Doubler).workers(3).spawn(
            in_rx,
            Some(out_tx),
            StageContext::new(token.clone(), sink.accountant(1, progress)),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let joined = tokio::time::timeout(Duration::from_secs(2), async {
            tokio::join!(source.wait(), barrier.wait())
        })
        .await
        .expect("workers must exit after cancellation");
        assert!(joined.0.unwrap().processed < 1_000);
        assert!(joined.1.is_ok());

        sink.close();
        reporter.finish().await;
    }

    #[tokio::test]
    async fn terminal_stage_cannot_emit() {
        let (sink, _errors) = error_sink::<String>();
        let output: StageOutput<u64, String> = StageOutput {
            stage: "terminal",
            sender: None,
            accountant: sink.accountant(1, ProgressTracker::new(1)),
            token: CancellationToken::new(),
        };
        assert!(matches!(
            output.emit(1).await,
            Err(PipelineError::ChannelClosed(_))
        ));
    }
}
