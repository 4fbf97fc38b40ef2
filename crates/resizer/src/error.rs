use std::path::PathBuf;

use pipeline_common::PipelineError;

use crate::stages::{DECODE, EXPAND, PERSIST};

/// Per-item failure. Each one is reported once and never retried.
#[derive(Debug, thiserror::Error)]
pub enum ResizeError {
    #[error("source not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("cannot prepare destination {}: {reason}", .path.display())]
    DestinationPrep { path: PathBuf, reason: String },

    #[error("failed to encode {}: {reason}", .path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResizeError {
    /// Name of the stage that raised this error.
    pub fn stage(&self) -> &'static str {
        match self {
            ResizeError::SourceNotFound { .. } | ResizeError::Decode { .. } => DECODE,
            ResizeError::DestinationPrep { .. } => EXPAND,
            ResizeError::Encode { .. } | ResizeError::Write { .. } => PERSIST,
        }
    }

    /// Source path for decode failures, destination path otherwise.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ResizeError::SourceNotFound { path }
            | ResizeError::Decode { path, .. }
            | ResizeError::DestinationPrep { path, .. }
            | ResizeError::Encode { path, .. }
            | ResizeError::Write { path, .. } => path,
        }
    }
}

/// Fatal problem found before any stage starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid image size `{input}`: {reason}")]
    InvalidSize { input: String, reason: String },

    #[error("at least one image size is required")]
    NoSizes,

    #[error("image size suffix `{0}` is used more than once")]
    DuplicateSuffix(String),

    #[error("an input file glob is required")]
    MissingInput,

    #[error("an output directory is required")]
    MissingOutput,

    #[error("image quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("unknown stage `{0}` (expected one of decode, expand, transform, persist)")]
    UnknownStage(String),

    #[error("invalid input glob `{pattern}`: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("input glob `{pattern}` matched no files")]
    NoMatches { pattern: String },

    #[error("output path {} exists and is not a directory", .path.display())]
    OutputNotDirectory { path: PathBuf },

    #[error("cannot use output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a run could not produce a report.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}
