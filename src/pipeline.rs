//! Pipeline orchestration: extract, compose, persist
//!
//! One pipeline instance holds the process-scoped segmentation handle and is
//! shared across concurrent invocations. Each invocation runs to completion
//! inside one unit of work: decode the upload, obtain an alpha estimate from
//! the backend, optionally refine it, composite onto the background, and
//! (for `run`) persist the result under a fresh artifact identifier.

use crate::artifact::{ArtifactId, ArtifactStore};
use crate::backends::SegmentationBackend;
use crate::compositor;
use crate::config::PipelineConfig;
use crate::error::{BgSwapError, Result};
use crate::matting;
use crate::types::{BackgroundImage, CompositeOutput, Matte, StageTimings};
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Background replacement pipeline
///
/// The segmentation backend is injected once and reused for every
/// invocation — re-initializing a model session per request is a severe
/// performance bug this design rules out. All methods take `&self`;
/// concurrent invocations are independent and may complete in any order.
pub struct BackgroundSwapPipeline {
    backend: Arc<dyn SegmentationBackend>,
    config: PipelineConfig,
    store: ArtifactStore,
}

impl BackgroundSwapPipeline {
    /// Create a pipeline around a shared segmentation handle
    pub fn new(
        backend: Arc<dyn SegmentationBackend>,
        config: PipelineConfig,
        store: ArtifactStore,
    ) -> Self {
        Self {
            backend,
            config,
            store,
        }
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The artifact store backing `run`
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Extract an alpha-matted foreground from raw image bytes
    ///
    /// # Errors
    /// - `Decode` for undecodable input
    /// - `Extraction` on segmentation capability failure — the source is
    ///   never passed through as a fake foreground
    /// - `Format` if matting inputs disagree in dimensions
    pub async fn extract(&self, source_bytes: &[u8]) -> Result<Matte> {
        let mut timings = StageTimings::default();
        self.extract_with_timings(source_bytes, &mut timings).await
    }

    /// Extract and compose in one invocation, without persistence
    ///
    /// # Errors
    /// - All `extract` errors
    /// - `Format` / `Composite` from the compositor
    #[instrument(skip(self, source_bytes, background), fields(backend = %self.backend.name()))]
    pub async fn process(
        &self,
        source_bytes: &[u8],
        background: &BackgroundImage,
    ) -> Result<CompositeOutput> {
        let total_start = Instant::now();
        let mut timings = StageTimings::default();

        let matte = self.extract_with_timings(source_bytes, &mut timings).await?;

        let composite_start = Instant::now();
        let mut output = compositor::compose(&matte, background.as_image())?;
        timings.composite_ms = composite_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;
        output.timings = timings;

        debug!("{}", output.timings.summary());
        Ok(output)
    }

    /// Full pipeline run: extract, compose, persist
    ///
    /// Returns the identifier of the persisted artifact. On any failure
    /// nothing is written.
    ///
    /// # Errors
    /// - All `process` errors
    /// - Encoding or file-write failures while persisting
    pub async fn run(
        &self,
        source_bytes: &[u8],
        background: &BackgroundImage,
    ) -> Result<ArtifactId> {
        let mut output = self.process(source_bytes, background).await?;

        let encode_start = Instant::now();
        let artifact = self.store.persist(
            &output,
            self.config.output_format,
            self.config.jpeg_quality,
        )?;
        output.timings.encode_ms = Some(encode_start.elapsed().as_millis() as u64);

        info!(
            artifact = %artifact,
            "{}",
            output.timings.summary()
        );
        Ok(artifact)
    }

    /// Like [`run`](Self::run), loading the background from a path
    ///
    /// # Errors
    /// - Background unreadable or undecodable
    /// - All `run` errors
    pub async fn run_with_background_path<P: AsRef<Path>>(
        &self,
        source_bytes: &[u8],
        background_path: P,
    ) -> Result<ArtifactId> {
        let background = BackgroundImage::load(background_path)?;
        self.run(source_bytes, &background).await
    }

    /// Extraction with the timing breakdown threaded through
    async fn extract_with_timings(
        &self,
        source_bytes: &[u8],
        timings: &mut StageTimings,
    ) -> Result<Matte> {
        let decode_start = Instant::now();
        let image = image::load_from_memory(source_bytes)
            .map_err(|e| BgSwapError::decode_failure("failed to decode source image", &e))?;
        let source_rgb = image.to_rgb8();
        let (width, height) = source_rgb.dimensions();
        timings.decode_ms = decode_start.elapsed().as_millis() as u64;

        let segment_start = Instant::now();
        let mask = self.backend.segment(source_bytes).await?;
        timings.segment_ms = segment_start.elapsed().as_millis() as u64;

        // Reconcile a backend that answered at a different resolution
        let mask = if mask.dimensions == (width, height) {
            mask
        } else {
            debug!(
                "resampling backend mask from {}x{} to {}x{}",
                mask.dimensions.0, mask.dimensions.1, width, height
            );
            mask.resize(width, height)?
        };

        let mask = if self.config.matte.refine {
            let refine_start = Instant::now();
            let refined = matting::refine_alpha(&source_rgb, &mask, &self.config.matte)?;
            timings.refine_ms = refine_start.elapsed().as_millis() as u64;
            refined
        } else {
            mask
        };

        Matte::from_parts(&source_rgb, &mask)
    }
}

impl std::fmt::Debug for BackgroundSwapPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSwapPipeline")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
