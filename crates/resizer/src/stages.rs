//! The four worker stages behind enumeration.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::GenericImageView;
use pipeline_common::{PipelineError, Processor, StageOutput};
use tracing::{debug, trace};

use crate::codec::Codec;
use crate::destination::{self, Probe};
use crate::error::ResizeError;
use crate::size::SizeSpec;
use crate::work::{DecodedAsset, Outcome, SourceRef, Target, TargetInfo, TransformedTarget};

pub const ENUMERATE: &str = "enumerate";
pub const DECODE: &str = "decode";
pub const EXPAND: &str = "expand";
pub const TRANSFORM: &str = "transform";
pub const PERSIST: &str = "persist";

/// Stages whose worker count can be configured.
pub const WORKER_STAGES: [&str; 4] = [DECODE, EXPAND, TRANSFORM, PERSIST];

/// Retire a unit or route its failure to the error sink.
async fn settle<O>(
    output: &StageOutput<O, ResizeError>,
    outcome: Outcome,
) -> Result<(), PipelineError> {
    match outcome {
        Outcome::Failed(error) => output.fail(error).await,
        settled => {
            output.complete(settled.status());
            Ok(())
        }
    }
}

/// SourceRef -> DecodedAsset
pub struct Decode {
    codec: Arc<dyn Codec>,
}

impl Decode {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl Processor for Decode {
    type Input = SourceRef;
    type Output = DecodedAsset;
    type Error = ResizeError;

    fn name(&self) -> &'static str {
        DECODE
    }

    async fn process(
        &self,
        source: SourceRef,
        output: &StageOutput<DecodedAsset, ResizeError>,
    ) -> Result<(), PipelineError> {
        let codec = self.codec.clone();
        let path = source.path().to_path_buf();
        let decoded = tokio::task::spawn_blocking(move || codec.decode(&path))
            .await
            .map_err(|e| PipelineError::from_join(DECODE, e))?;

        match decoded {
            Ok(image) => {
                let (width, height) = image.dimensions();
                debug!(path = %source, width, height, "Decoded source");
                output.emit(DecodedAsset { source, image }).await
            }
            Err(e) => output.fail(e).await,
        }
    }
}

/// DecodedAsset -> one Target per configured size
pub struct Expand {
    sizes: Arc<[SizeSpec]>,
    output_dir: PathBuf,
    force: bool,
}

impl Expand {
    pub fn new(sizes: Arc<[SizeSpec]>, output_dir: PathBuf, force: bool) -> Self {
        Self {
            sizes,
            output_dir,
            force,
        }
    }
}

#[async_trait]
impl Processor for Expand {
    type Input = DecodedAsset;
    type Output = Target;
    type Error = ResizeError;

    fn name(&self) -> &'static str {
        EXPAND
    }

    async fn process(
        &self,
        asset: DecodedAsset,
        output: &StageOutput<Target, ResizeError>,
    ) -> Result<(), PipelineError> {
        for size in self.sizes.iter() {
            let destination =
                destination::destination_path(&self.output_dir, asset.source.path(), size.suffix());

            let existed = match destination::probe(&destination).await {
                Ok(Probe::Vacant) => false,
                Ok(Probe::Occupied) if self.force => true,
                Ok(Probe::Occupied) => {
                    debug!(path = %destination.display(), "Destination exists, skipping");
                    settle(output, Outcome::SkippedExists).await?;
                    continue;
                }
                Err(e) => {
                    settle(output, Outcome::Failed(e)).await?;
                    continue;
                }
            };

            let target = Target {
                info: TargetInfo {
                    source: asset.source.clone(),
                    size: size.clone(),
                    destination,
                    existed,
                    force: self.force,
                },
                image: asset.image.clone(),
            };
            output.emit(target).await?;
        }
        Ok(())
    }
}

/// Target -> TransformedTarget
pub struct Transform {
    codec: Arc<dyn Codec>,
}

impl Transform {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl Processor for Transform {
    type Input = Target;
    type Output = TransformedTarget;
    type Error = ResizeError;

    fn name(&self) -> &'static str {
        TRANSFORM
    }

    async fn process(
        &self,
        target: Target,
        output: &StageOutput<TransformedTarget, ResizeError>,
    ) -> Result<(), PipelineError> {
        let Target { info, image } = target;
        let max = info.size.max_dimension();

        let image = if info.size.is_passthrough() {
            image
        } else {
            let codec = self.codec.clone();
            tokio::task::spawn_blocking(move || codec.resize_to_fit(&image, max))
                .await
                .map_err(|e| PipelineError::from_join(TRANSFORM, e))?
        };

        trace!(path = %info.destination.display(), max, "Transformed target");
        output.emit(TransformedTarget { info, image }).await
    }
}

/// TransformedTarget -> file on disk
pub struct Persist {
    codec: Arc<dyn Codec>,
    quality: u8,
}

impl Persist {
    pub fn new(codec: Arc<dyn Codec>, quality: u8) -> Self {
        Self { codec, quality }
    }
}

#[async_trait]
impl Processor for Persist {
    type Input = TransformedTarget;
    type Output = ();
    type Error = ResizeError;

    fn name(&self) -> &'static str {
        PERSIST
    }

    async fn process(
        &self,
        target: TransformedTarget,
        output: &StageOutput<(), ResizeError>,
    ) -> Result<(), PipelineError> {
        let TransformedTarget { info, image } = target;
        let codec = self.codec.clone();
        let quality = self.quality;

        let encoded = tokio::task::spawn_blocking(move || codec.encode(&image, quality))
            .await
            .map_err(|e| PipelineError::from_join(PERSIST, e))?;
        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = ResizeError::Encode {
                    path: info.destination,
                    reason: e.to_string(),
                };
                return settle(output, Outcome::Failed(error)).await;
            }
        };

        // no new writes once the run is cancelled
        if output.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let outcome = destination::write(&info.destination, &bytes, info.force).await;
        match &outcome {
            Outcome::Saved => debug!(
                path = %info.destination.display(),
                bytes = bytes.len(),
                overwritten = info.existed,
                "Saved"
            ),
            Outcome::SkippedExists => {
                debug!(path = %info.destination.display(), "Destination appeared, skipping")
            }
            Outcome::Failed(_) => {}
        }
        settle(output, outcome).await
    }
}
