//! Segmentation backend implementations
//!
//! The pipeline treats background segmentation as an external capability
//! behind one trait, with two variants:
//! - Remote API backend (HTTP, remove.bg wire contract)
//! - Tract backend (pure Rust local inference, feature `tract`)
//!
//! A backend handle is created once at process scope and shared across
//! concurrent pipeline invocations; `segment` takes `&self` and
//! implementations must be safe for concurrent use.

pub mod remote;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend and pipeline testing
#[cfg(test)]
pub(crate) mod test_utils;

pub use self::remote::RemoteBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

use crate::error::Result;
use crate::types::AlphaMask;
use async_trait::async_trait;

/// External segmentation capability
///
/// Given raw encoded image bytes, produce a subject-confidence alpha raster.
/// Implementations must not fall back to treating the whole input as
/// foreground on failure; they surface an `Extraction` error instead, since
/// a silent fallback would corrupt every downstream composite.
#[async_trait]
pub trait SegmentationBackend: Send + Sync {
    /// Produce an alpha raster for the given image bytes
    ///
    /// The returned mask should match the input resolution; the extractor
    /// resamples it if a backend cannot guarantee that.
    ///
    /// # Errors
    /// - `Decode` when the input bytes are not a raster image
    /// - `Extraction` on capability failure (network, auth, non-success
    ///   status, malformed response, inference failure)
    async fn segment(&self, image_bytes: &[u8]) -> Result<AlphaMask>;

    /// Backend name for logs and diagnostics
    fn name(&self) -> &str;
}
