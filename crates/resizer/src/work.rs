//! Work units as they move through the stages.
//!
//! Each state of a unit is its own type, so a stage can only accept what the
//! previous stage produced.

use std::fmt;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use pipeline_common::UnitStatus;

use crate::error::ResizeError;
use crate::size::SizeSpec;

/// One input file found by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    path: PathBuf,
}

impl SourceRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.display().fmt(f)
    }
}

/// A successfully decoded source. The bitmap is not modified after decoding.
#[derive(Debug)]
pub struct DecodedAsset {
    pub source: SourceRef,
    pub image: DynamicImage,
}

/// Everything about one (source, size) pair except its pixels.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub source: SourceRef,
    pub size: SizeSpec,
    pub destination: PathBuf,
    /// A regular file already existed at `destination` when it was probed.
    pub existed: bool,
    pub force: bool,
}

/// One size variant awaiting its resize, with its own copy of the bitmap.
#[derive(Debug)]
pub struct Target {
    pub info: TargetInfo,
    pub image: DynamicImage,
}

/// A variant whose bitmap is ready for encoding.
#[derive(Debug)]
pub struct TransformedTarget {
    pub info: TargetInfo,
    pub image: DynamicImage,
}

/// Terminal result of one target.
#[derive(Debug)]
pub enum Outcome {
    Saved,
    SkippedExists,
    Failed(ResizeError),
}

impl Outcome {
    pub fn status(&self) -> UnitStatus {
        match self {
            Outcome::Saved => UnitStatus::Succeeded,
            Outcome::SkippedExists => UnitStatus::Skipped,
            Outcome::Failed(_) => UnitStatus::Failed,
        }
    }
}
