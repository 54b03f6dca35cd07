//! End-to-end pipeline tests against the public API
//!
//! A mock segmentation backend stands in for the external capability so the
//! real extractor, matting and compositor paths run without a model file or
//! network access.

use bgswap::{
    AlphaMask, ArtifactStore, BackgroundImage, BackgroundSwapPipeline, BgSwapError, MatteOptions,
    PipelineConfig, SegmentationBackend,
};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::sync::Arc;

/// Mock backend producing a hard cutout: bright pixels are subject
///
/// Mirrors what a real segmentation service returns before refinement — a
/// mostly-binary mask with a thin blurred rim at subject edges.
struct LuminanceBackend;

#[async_trait]
impl SegmentationBackend for LuminanceBackend {
    async fn segment(&self, image_bytes: &[u8]) -> bgswap::Result<AlphaMask> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| BgSwapError::decode_failure("failed to decode input image", &e))?;
        let mut mask = image.to_luma8();
        for pixel in mask.pixels_mut() {
            pixel.0 = [if pixel.0[0] > 127 { 255 } else { 0 }];
        }
        Ok(AlphaMask::from_image(&mask))
    }

    fn name(&self) -> &str {
        "mock-luminance"
    }
}

/// Mock backend rejecting every request like an expired API key
struct ForbiddenBackend;

#[async_trait]
impl SegmentationBackend for ForbiddenBackend {
    async fn segment(&self, _image_bytes: &[u8]) -> bgswap::Result<AlphaMask> {
        Err(BgSwapError::service_status(403, "API key expired"))
    }

    fn name(&self) -> &str {
        "mock-forbidden"
    }
}

/// A 400x600 portrait-like JPEG: bright subject blob on a dark backdrop
fn portrait_jpeg() -> Vec<u8> {
    let mut image = RgbImage::new(400, 600);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = x as f32 - 200.0;
        let dy = y as f32 - 320.0;
        let inside = (dx * dx) / (120.0 * 120.0) + (dy * dy) / (220.0 * 220.0) < 1.0;
        pixel.0 = if inside { [230, 210, 190] } else { [25, 25, 28] };
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// An 800x800 PNG background with visible structure
fn studio_background() -> BackgroundImage {
    let mut image = RgbImage::new(800, 800);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        pixel.0 = [(x / 4) as u8, 90, (y / 4) as u8];
    }
    BackgroundImage::from_image(DynamicImage::ImageRgb8(image))
}

fn default_pipeline(
    backend: Arc<dyn SegmentationBackend>,
    dir: &tempfile::TempDir,
) -> BackgroundSwapPipeline {
    let _ = env_logger::builder().is_test(true).try_init();
    BackgroundSwapPipeline::new(
        backend,
        PipelineConfig::default(),
        ArtifactStore::new(dir.path()).unwrap(),
    )
}

#[tokio::test]
async fn end_to_end_portrait_swap() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = default_pipeline(Arc::new(LuminanceBackend), &dir);
    let background = studio_background();
    let source = portrait_jpeg();

    let artifact = pipeline.run(&source, &background).await.unwrap();
    let path = pipeline.store().path_for(&artifact);

    let output = image::open(&path).unwrap();
    assert_eq!((output.width(), output.height()), (400, 600));
    // Flattened composite carries no alpha channel
    assert!(matches!(output, DynamicImage::ImageRgb8(_)));
}

#[tokio::test]
async fn reruns_produce_identical_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = default_pipeline(Arc::new(LuminanceBackend), &dir);
    let background = studio_background();
    let source = portrait_jpeg();

    let first = pipeline.run(&source, &background).await.unwrap();
    let second = pipeline.run(&source, &background).await.unwrap();
    assert_ne!(first, second, "artifact identifiers must be unique");

    let first_pixels = image::open(pipeline.store().path_for(&first))
        .unwrap()
        .to_rgb8();
    let second_pixels = image::open(pipeline.store().path_for(&second))
        .unwrap()
        .to_rgb8();
    assert_eq!(first_pixels.as_raw(), second_pixels.as_raw());
}

#[tokio::test]
async fn process_follows_matte_dimensions_not_background() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = default_pipeline(Arc::new(LuminanceBackend), &dir);
    let source = portrait_jpeg();

    for (bg_w, bg_h) in [(100, 100), (800, 800), (1333, 57)] {
        let background = BackgroundImage::from_image(DynamicImage::ImageRgb8(
            RgbImage::from_pixel(bg_w, bg_h, Rgb([128, 0, 255])),
        ));
        let output = pipeline.process(&source, &background).await.unwrap();
        assert_eq!(output.dimensions(), (400, 600));
    }
}

#[tokio::test]
async fn refinement_can_be_disabled_per_request_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .matte(MatteOptions::builder().refine(false).build().unwrap())
        .build()
        .unwrap();
    let pipeline = BackgroundSwapPipeline::new(
        Arc::new(LuminanceBackend),
        config,
        ArtifactStore::new(dir.path()).unwrap(),
    );

    let matte = pipeline.extract(&portrait_jpeg()).await.unwrap();
    assert_eq!(matte.dimensions(), (400, 600));

    // Plain cutout keeps the backend's hard alpha: every value present in
    // the luminance image must appear unchanged
    let stats = matte.alpha_mask().statistics();
    assert!(stats.foreground_pixels > 0);
    assert!(stats.background_pixels > 0);
}

#[tokio::test]
async fn extraction_failure_leaves_no_artifact_and_cleanup_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = default_pipeline(Arc::new(ForbiddenBackend), &dir);
    let background = studio_background();

    // Serving-layer discipline: the transient upload is removed regardless
    // of pipeline outcome
    let upload_dir = tempfile::tempdir().unwrap();
    let upload_path = upload_dir.path().join("upload.jpg");
    std::fs::write(&upload_path, portrait_jpeg()).unwrap();

    let source = std::fs::read(&upload_path).unwrap();
    let result = pipeline.run(&source, &background).await;
    std::fs::remove_file(&upload_path).unwrap();

    match result {
        Err(BgSwapError::Extraction(msg)) => {
            assert!(msg.contains("403"));
            assert!(msg.contains("API key expired"));
        },
        other => panic!("expected extraction error, got {:?}", other.map(|id| id.to_string())),
    }

    assert!(!upload_path.exists());
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        0,
        "no artifact may be written on failure"
    );
}

#[tokio::test]
async fn garbage_input_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = default_pipeline(Arc::new(LuminanceBackend), &dir);
    let background = studio_background();

    let result = pipeline.run(b"%PDF-1.4 not an image", &background).await;
    assert!(matches!(result, Err(BgSwapError::Decode(_))));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn concurrent_requests_share_one_backend_handle() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(default_pipeline(Arc::new(LuminanceBackend), &dir));
    let background = studio_background();
    let source = portrait_jpeg();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let pipeline = Arc::clone(&pipeline);
        let background = background.clone();
        let source = source.clone();
        handles.push(tokio::spawn(async move {
            pipeline.run(&source, &background).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    ids.dedup();
    assert_eq!(ids.len(), 4, "artifact identifiers must not collide");
}
