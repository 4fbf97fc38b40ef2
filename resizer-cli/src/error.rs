use resizer_engine::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline_common::PipelineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid config file {path}: {reason}")]
    ConfigFile { path: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
