//! Bitmap decoding, resizing and JPEG encoding.

use std::io::ErrorKind;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError};

use crate::error::ResizeError;

/// Content transformation used by the stages.
///
/// Every method is blocking; the stages call them from `spawn_blocking`.
pub trait Codec: Send + Sync + 'static {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ResizeError>;

    /// Shrink so the longer edge equals `max_dimension`, keeping the aspect ratio.
    /// Images that already fit are returned unscaled.
    fn resize_to_fit(&self, image: &DynamicImage, max_dimension: u32) -> DynamicImage;

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError>;
}

/// [`Codec`] backed by the `image` crate, resampling with Lanczos3.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl Codec for ImageCodec {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ResizeError> {
        image::open(path).map_err(|e| match e {
            ImageError::IoError(io) if io.kind() == ErrorKind::NotFound => {
                ResizeError::SourceNotFound {
                    path: path.to_path_buf(),
                }
            }
            other => ResizeError::Decode {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })
    }

    fn resize_to_fit(&self, image: &DynamicImage, max_dimension: u32) -> DynamicImage {
        let (width, height) = image.dimensions();
        if width <= max_dimension && height <= max_dimension {
            return image.clone();
        }
        image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
        // JPEG has no alpha channel
        let rgb = image.to_rgb8();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&rgb)?;
        Ok(buf)
    }
}
