//! # Resizer Engine
//!
//! Batch image resizing on top of `pipeline-common`. Every source matched by the
//! input glob is decoded once, expanded into one target per configured size,
//! resized to fit and written out as JPEG.
//!
//! ## Features
//!
//! - `suffix:size` size lists, with `0` keeping the source dimensions
//! - Existing outputs are skipped unless overwriting is forced
//! - Per-item failures are reported once and never stop the batch
//! - Progress is accounted in `sources × sizes` units, failed units included
//! - Cancellable at any point through a shared `CancellationToken`
//!
//! ## Example
//!
//! ```no_run
//! use pipeline_common::CancellationToken;
//! use resizer_engine::{ResizeOptions, ResizePipeline, parse_size_list};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ResizeOptions::new(parse_size_list("_sm:50,_lg:0")?, "photos/*.png", "out");
//! let report = ResizePipeline::new(options, CancellationToken::new())
//!     .execute()
//!     .await?;
//! println!("saved {} of {}", report.saved, report.expected);
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! MIT License
//!
//! ## Authors
//!
//! - hua0512
//!

pub mod codec;
pub mod destination;
pub mod error;
pub mod options;
pub mod orchestrator;
pub mod size;
pub mod stages;
pub mod work;

pub use codec::{Codec, ImageCodec};
pub use error::{ConfigError, ResizeError, RunError};
pub use options::{DEFAULT_QUALITY, ResizeOptions};
pub use orchestrator::{ResizePipeline, RunReport};
pub use size::{SizeSpec, parse_size_list};
pub use work::{DecodedAsset, Outcome, SourceRef, Target, TargetInfo, TransformedTarget};
