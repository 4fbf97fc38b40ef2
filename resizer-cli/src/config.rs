//! Optional TOML config file and its merge with the command line.
//!
//! ```toml
//! image-sizes = ["_sm:50", "_lg:0"]
//! input-file-glob = "photos/*.png"
//! output-directory = "out"
//! image-quality = 85
//! worker-count = 4
//!
//! [stage-workers]
//! persist = 8
//! ```
//!
//! Values given on the command line (or through `RESIZER_*` variables) win over
//! the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pipeline_common::PipelineConfig;
use pipeline_common::config::DEFAULT_WORKER_COUNT;
use resizer_engine::{DEFAULT_QUALITY, ResizeOptions, parse_size_list};
use serde::Deserialize;
use tracing::debug;

use crate::cli::Args;
use crate::error::AppError;
use crate::utils::parse_stage_workers;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    /// Each entry may itself be a comma-separated list.
    pub image_sizes: Vec<String>,
    pub input_file_glob: Option<String>,
    pub output_directory: Option<PathBuf>,
    pub force_save: Option<bool>,
    pub image_quality: Option<u8>,
    pub worker_count: Option<usize>,
    pub stage_workers: BTreeMap<String, usize>,
    pub strict: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let invalid = |reason: String| AppError::ConfigFile {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let config: FileConfig = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Everything `main` needs to start a run.
#[derive(Debug)]
pub struct Settings {
    pub options: ResizeOptions,
    pub strict: bool,
}

/// Merge command-line arguments over `file`.
pub fn resolve(args: &Args, file: FileConfig) -> Result<Settings, AppError> {
    let sizes = if args.image_sizes.is_empty() {
        let mut sizes = Vec::new();
        for entry in &file.image_sizes {
            sizes.extend(parse_size_list(entry)?);
        }
        sizes
    } else {
        args.image_sizes.clone()
    };

    let input_glob = args
        .input_glob
        .clone()
        .or(file.input_file_glob)
        .unwrap_or_default();
    let output_dir = args
        .output_dir
        .clone()
        .or(file.output_directory)
        .unwrap_or_default();

    let mut pipeline = PipelineConfig::builder().worker_count(
        args.workers
            .or(file.worker_count)
            .unwrap_or(DEFAULT_WORKER_COUNT),
    );
    for (stage, count) in file.stage_workers {
        pipeline = pipeline.stage_workers(stage, count);
    }
    for (stage, count) in parse_stage_workers(&args.stage_workers)? {
        pipeline = pipeline.stage_workers(stage, count);
    }

    let options = ResizeOptions::new(sizes, input_glob, output_dir)
        .with_force(args.force || file.force_save.unwrap_or(false))
        .with_quality(args.quality.or(file.image_quality).unwrap_or(DEFAULT_QUALITY))
        .with_pipeline(pipeline.build());

    Ok(Settings {
        options,
        strict: args.strict || file.strict.unwrap_or(false),
    })
}
