mod cli;
mod config;
mod error;
mod input;
mod progress;
mod utils;

use crate::{
    cli::Args,
    config::{FileConfig, Settings},
    error::AppError,
};
use clap::Parser;
use mimalloc::MiMalloc;
use pipeline_common::CancellationToken;
use resizer_engine::{ResizePipeline, RunReport};
use std::process;
use tracing::{Instrument, Level, Span, debug, error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// `--strict` run in which some outputs could not be produced.
const EXIT_PARTIAL_FAILURE: i32 = 2;
/// Run stopped by an interrupt (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let show_progress = !(args.no_progress || args.quiet);
    init_logging(args.verbose, args.quiet, show_progress);

    match run(args, show_progress).await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Application error: {e}");
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

async fn run(args: Args, show_progress: bool) -> Result<i32, AppError> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let Settings { options, strict } = config::resolve(&args, file)?;

    let mut pipeline = ResizePipeline::new(options, CancellationToken::new());
    debug!(options = ?pipeline.options(), strict, "Resolved options");
    tokio::spawn(input::interrupt_handler(pipeline.token().clone()));

    let sources = pipeline.prepare().await?;
    let expected = pipeline.expected_units(sources.len());

    let span = if show_progress {
        let span = progress::progress_span(expected);
        pipeline = pipeline.with_progress(progress::bar_callback(span.clone()));
        span
    } else {
        Span::none()
    };

    let report = pipeline.run(sources).instrument(span).await?;
    print_summary(&report);

    if report.cancelled {
        warn!(
            completed = report.completed,
            expected = report.expected,
            "Run interrupted before every output was produced"
        );
        return Ok(EXIT_INTERRUPTED);
    }
    if strict && report.has_failures() {
        return Ok(EXIT_PARTIAL_FAILURE);
    }
    Ok(0)
}

fn print_summary(report: &RunReport) {
    for stage in &report.stages {
        debug!(
            stage = stage.stage,
            workers = stage.workers,
            processed = stage.processed,
            "Stage summary"
        );
    }
    info!(
        saved = report.saved,
        skipped = report.skipped,
        failed = report.failed,
        warnings = report.warnings.len(),
        "Run complete"
    );
    println!(
        "{} saved, {} skipped, {} failed ({}/{} outputs)",
        report.saved, report.skipped, report.failed, report.completed, report.expected
    );
}

fn init_logging(verbose: bool, quiet: bool, progress: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    if progress {
        // log lines go through the bar's writer so they do not tear it
        let indicatif_layer = IndicatifLayer::new();
        subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(indicatif_layer.get_stderr_writer()),
            )
            .with(indicatif_layer)
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
