//! Wires the stages together and runs a batch to completion.
//!
//! ```text
//! enumerate -> decode -> expand -> transform -> persist
//!                 \          \                     /
//!                  +----------+---- error sink ---+
//! ```
//!
//! Every channel between stages is a rendezvous hand-off sized by
//! [`PipelineConfig`](pipeline_common::PipelineConfig). The run waits for each
//! stage's completion barrier, then closes the error sink so the reporter can
//! drain and exit.

use std::sync::Arc;

use pipeline_common::{
    CancellationToken, ErrorReporter, PipelineError, ProgressCallback, ProgressTracker, Stage,
    StageContext, StageReport, error_sink, spawn_source,
};
use tracing::{debug, error, info, warn};

use crate::codec::{Codec, ImageCodec};
use crate::error::{ConfigError, ResizeError, RunError};
use crate::options::ResizeOptions;
use crate::size::SizeSpec;
use crate::stages::{
    DECODE, Decode, ENUMERATE, EXPAND, Expand, PERSIST, Persist, TRANSFORM, Transform,
};
use crate::work::SourceRef;

/// What a finished run did.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// `sources × sizes`
    pub expected: u64,
    pub completed: u64,
    pub saved: u64,
    pub skipped: u64,
    pub failed: u64,
    /// One message per reported per-item error, in arrival order.
    pub warnings: Vec<String>,
    /// The run was interrupted before every unit was retired.
    pub cancelled: bool,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

pub struct ResizePipeline {
    options: ResizeOptions,
    token: CancellationToken,
    codec: Arc<dyn Codec>,
    on_progress: Option<ProgressCallback>,
}

impl ResizePipeline {
    pub fn new(options: ResizeOptions, token: CancellationToken) -> Self {
        Self {
            options,
            token,
            codec: Arc::new(ImageCodec),
            on_progress: None,
        }
    }

    pub fn with_codec(mut self, codec: impl Codec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Invoke `callback` every time units are retired.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn options(&self) -> &ResizeOptions {
        &self.options
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Number of progress units a run over `sources` accounts for.
    pub fn expected_units(&self, sources: usize) -> u64 {
        sources as u64 * self.options.sizes.len() as u64
    }

    /// Validate the options, prepare the output directory and expand the glob.
    ///
    /// A failure here is fatal: the token is cancelled before the error is returned.
    pub async fn prepare(&self) -> Result<Vec<SourceRef>, ConfigError> {
        let prepared = async {
            self.options.validate()?;
            self.options.prepare_output_dir().await?;
            self.options.discover_sources()
        }
        .await;

        if let Err(e) = &prepared {
            error!(error = %e, "Startup failed");
            self.token.cancel();
        }
        prepared
    }

    /// [`prepare`](Self::prepare) then [`run`](Self::run).
    pub async fn execute(&self) -> Result<RunReport, RunError> {
        let sources = self.prepare().await?;
        Ok(self.run(sources).await?)
    }

    /// Push `sources` through every stage and wait for the whole pipeline to drain.
    pub async fn run(&self, sources: Vec<SourceRef>) -> Result<RunReport, PipelineError> {
        let config = &self.options.pipeline;
        let sizes: Arc<[SizeSpec]> = self.options.sizes.clone().into();
        let expected = self.expected_units(sources.len());
        let token = self.token.clone();

        let progress = match &self.on_progress {
            Some(callback) => ProgressTracker::with_callback(expected, callback.clone()),
            None => ProgressTracker::new(expected),
        };

        info!(
            sources = sources.len(),
            sizes = sizes.len(),
            expected,
            workers = config.worker_count,
            "Starting resize run"
        );

        let (sink, errors) = error_sink::<ResizeError>();
        let reporter = ErrorReporter::fold(errors, Vec::new(), |warnings: &mut Vec<String>, e| {
            warn!(stage = e.stage(), path = %e.path().display(), "{e}");
            warnings.push(e.to_string());
        });
        let context = |retire: u64| {
            StageContext::new(token.clone(), sink.accountant(retire, progress.clone()))
        };

        let (source_tx, source_rx) = config.channel();
        let (decoded_tx, decoded_rx) = config.channel();
        let (target_tx, target_rx) = config.channel();
        let (transformed_tx, transformed_rx) = config.channel();

        let enumerate = spawn_source(ENUMERATE, sources, source_tx, token.clone());
        // a decode failure preempts every size of that source
        let decode = Stage::new(Decode::new(self.codec.clone()))
            .workers(config.workers_for(DECODE))
            .spawn(source_rx, Some(decoded_tx), context(sizes.len() as u64));
        let expand = Stage::new(Expand::new(
            sizes.clone(),
            self.options.output_dir.clone(),
            self.options.force,
        ))
        .workers(config.workers_for(EXPAND))
        .spawn(decoded_rx, Some(target_tx), context(1));
        let transform = Stage::new(Transform::new(self.codec.clone()))
            .workers(config.workers_for(TRANSFORM))
            .spawn(target_rx, Some(transformed_tx), context(1));
        let persist = Stage::new(Persist::new(self.codec.clone(), self.options.quality))
            .workers(config.workers_for(PERSIST))
            .spawn(transformed_rx, None, context(1));

        let joined = tokio::join!(
            enumerate.wait(),
            decode.wait(),
            expand.wait(),
            transform.wait(),
            persist.wait()
        );

        sink.close();
        let warnings = reporter.finish().await;

        let mut stages = Vec::with_capacity(5);
        for result in [joined.0, joined.1, joined.2, joined.3, joined.4] {
            stages.push(result?);
        }

        let snapshot = progress.snapshot();
        let report = RunReport {
            expected,
            completed: snapshot.completed,
            saved: snapshot.succeeded,
            skipped: snapshot.skipped,
            failed: snapshot.failed,
            warnings,
            cancelled: token.is_cancelled() && !snapshot.is_complete(),
            stages,
        };
        debug!(?report, "Run finished");
        Ok(report)
    }
}
