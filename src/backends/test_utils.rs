//! Mock segmentation backends for unit testing
//!
//! These avoid any model or network dependency while exercising the real
//! extractor and compositor paths.

use crate::backends::SegmentationBackend;
use crate::error::{BgSwapError, Result};
use crate::types::AlphaMask;
use async_trait::async_trait;

/// Mock backend whose alpha estimate is the input's luminance
///
/// Deterministic and resolution-preserving, which makes extractor
/// dimension properties easy to assert against arbitrary inputs.
pub(crate) struct LuminanceBackend;

#[async_trait]
impl SegmentationBackend for LuminanceBackend {
    async fn segment(&self, image_bytes: &[u8]) -> Result<AlphaMask> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| BgSwapError::decode_failure("failed to decode input image", &e))?;
        Ok(AlphaMask::from_image(&image.to_luma8()))
    }

    fn name(&self) -> &str {
        "mock-luminance"
    }
}

/// Mock backend returning a fixed mask regardless of input
///
/// Useful for exercising the mask-resample reconciliation path with a mask
/// whose dimensions differ from the input's.
pub(crate) struct FixedMaskBackend {
    pub(crate) mask: AlphaMask,
}

#[async_trait]
impl SegmentationBackend for FixedMaskBackend {
    async fn segment(&self, _image_bytes: &[u8]) -> Result<AlphaMask> {
        Ok(self.mask.clone())
    }

    fn name(&self) -> &str {
        "mock-fixed"
    }
}

/// Mock backend that fails like a rejected API call
pub(crate) struct FailingBackend;

#[async_trait]
impl SegmentationBackend for FailingBackend {
    async fn segment(&self, _image_bytes: &[u8]) -> Result<AlphaMask> {
        Err(BgSwapError::service_status(403, "API key rejected"))
    }

    fn name(&self) -> &str {
        "mock-failing"
    }
}
