//! Run configuration, validated once before the pipeline starts.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;

use pipeline_common::PipelineConfig;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::size::SizeSpec;
use crate::stages::WORKER_STAGES;
use crate::work::SourceRef;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 80;

#[derive(Debug, Clone)]
pub struct ResizeOptions {
    /// Output sizes, in the order targets are expanded.
    pub sizes: Vec<SizeSpec>,
    pub input_glob: String,
    pub output_dir: PathBuf,
    /// Overwrite destinations that already exist.
    pub force: bool,
    /// JPEG quality, 1 to 100.
    pub quality: u8,
    pub pipeline: PipelineConfig,
}

impl ResizeOptions {
    pub fn new(
        sizes: Vec<SizeSpec>,
        input_glob: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sizes,
            input_glob: input_glob.into(),
            output_dir: output_dir.into(),
            force: false,
            quality: DEFAULT_QUALITY,
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sizes.is_empty() {
            return Err(ConfigError::NoSizes);
        }
        let mut suffixes = HashSet::new();
        for size in &self.sizes {
            if !suffixes.insert(size.suffix()) {
                return Err(ConfigError::DuplicateSuffix(size.suffix().to_string()));
            }
        }

        if self.input_glob.trim().is_empty() {
            return Err(ConfigError::MissingInput);
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingOutput);
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::InvalidQuality(self.quality));
        }

        if self.pipeline.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        for (stage, count) in &self.pipeline.stage_workers {
            if !WORKER_STAGES.contains(&stage.as_str()) {
                return Err(ConfigError::UnknownStage(stage.clone()));
            }
            if *count == 0 {
                return Err(ConfigError::InvalidWorkerCount);
            }
        }
        Ok(())
    }

    /// Make sure the output directory exists, creating it when missing.
    pub async fn prepare_output_dir(&self) -> Result<(), ConfigError> {
        let path = &self.output_dir;
        let dir_err = |source| ConfigError::OutputDir {
            path: path.clone(),
            source,
        };

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::OutputNotDirectory { path: path.clone() }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Creating output directory");
                tokio::fs::create_dir_all(path).await.map_err(dir_err)
            }
            Err(e) => Err(dir_err(e)),
        }
    }

    /// Expand the input glob. At least one path must match.
    pub fn discover_sources(&self) -> Result<Vec<SourceRef>, ConfigError> {
        let pattern = &self.input_glob;
        let paths = glob::glob(pattern).map_err(|e| ConfigError::InvalidGlob {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        let mut sources = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) => sources.push(SourceRef::new(path)),
                Err(e) => {
                    warn!(path = %e.path().display(), error = %e.error(), "Unreadable glob entry")
                }
            }
        }

        if sources.is_empty() {
            return Err(ConfigError::NoMatches {
                pattern: pattern.clone(),
            });
        }
        debug!(pattern = %pattern, count = sources.len(), "Discovered sources");
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::parse_size_list;

    fn options() -> ResizeOptions {
        ResizeOptions::new(parse_size_list("_sm:50,_lg:0").unwrap(), "*.png", "out")
    }

    #[test]
    fn defaults_are_valid() {
        let options = options();
        assert_eq!(options.quality, 80);
        assert_eq!(options.pipeline.worker_count, 5);
        assert!(!options.force);
        options.validate().unwrap();
    }

    fn rejects(options: ResizeOptions, expected: fn(&ConfigError) -> bool) {
        let err = options.validate().unwrap_err();
        assert!(expected(&err), "unexpected error: {err}");
    }

    #[test]
    fn rejects_bad_settings() {
        rejects(options().with_quality(0), |e| {
            matches!(e, ConfigError::InvalidQuality(0))
        });
        rejects(options().with_quality(101), |e| {
            matches!(e, ConfigError::InvalidQuality(101))
        });
        rejects(ResizeOptions::new(Vec::new(), "*.png", "out"), |e| {
            matches!(e, ConfigError::NoSizes)
        });
        rejects(
            ResizeOptions::new(parse_size_list("_a:1,_a:2").unwrap(), "*.png", "out"),
            |e| matches!(e, ConfigError::DuplicateSuffix(_)),
        );
        rejects(
            ResizeOptions::new(parse_size_list("_a:1").unwrap(), " ", "out"),
            |e| matches!(e, ConfigError::MissingInput),
        );
        rejects(
            ResizeOptions::new(parse_size_list("_a:1").unwrap(), "*.png", ""),
            |e| matches!(e, ConfigError::MissingOutput),
        );
        rejects(
            options().with_pipeline(PipelineConfig::builder().worker_count(0).build()),
            |e| matches!(e, ConfigError::InvalidWorkerCount),
        );
        rejects(
            options().with_pipeline(PipelineConfig::builder().stage_workers("upload", 2).build()),
            |e| matches!(e, ConfigError::UnknownStage(_)),
        );
    }

    #[tokio::test]
    async fn output_dir_is_created_but_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let nested = dir.path().join("a").join("b");
        let mut options = options();
        options.output_dir = nested.clone();
        options.prepare_output_dir().await.unwrap();
        assert!(nested.is_dir());
        // already present is fine
        options.prepare_output_dir().await.unwrap();

        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        options.output_dir = file;
        assert!(matches!(
            options.prepare_output_dir().await,
            Err(ConfigError::OutputNotDirectory { .. })
        ));
    }

    #[test]
    fn glob_errors_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let base = glob::Pattern::escape(&dir.path().to_string_lossy());

        let mut options = options();
        options.input_glob = format!("{base}/***");
        assert!(matches!(
            options.discover_sources(),
            Err(ConfigError::InvalidGlob { .. })
        ));

        options.input_glob = format!("{base}/*.png");
        assert!(matches!(
            options.discover_sources(),
            Err(ConfigError::NoMatches { .. })
        ));

        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        let sources = options.discover_sources().unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|s| s.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png"]);
    }
}
