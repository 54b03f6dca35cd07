//! Core types for the matting-and-compositing pipeline

use crate::config::OutputFormat;
use crate::error::{BgSwapError, Result};
use image::{GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Grayscale subject-confidence raster produced by a segmentation backend
///
/// Values are in `[0, 255]`, 255 meaning definitely-subject. The mask is the
/// wire shape between the segmentation capability and the extractor; it is
/// bound to the source RGB only when the [`Matte`] is assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaMask {
    /// Mask data as grayscale values (0-255), row-major
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl AlphaMask {
    /// Create a new alpha mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Create a mask from a grayscale image
    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.as_raw().clone(), (width, height))
    }

    /// Convert the mask to a grayscale image
    ///
    /// # Errors
    /// - Mask data length does not match the stated dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            BgSwapError::format_mismatch(format!(
                "mask data length {} does not match {}x{}",
                self.data.len(),
                width,
                height
            ))
        })
    }

    /// Resize the mask to new dimensions with a high-quality filter
    ///
    /// # Errors
    /// - Mask data length does not match the stated dimensions
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<AlphaMask> {
        let current = self.to_image()?;
        let resized = image::imageops::resize(
            &current,
            new_width,
            new_height,
            image::imageops::FilterType::Lanczos3,
        );
        Ok(Self::from_image(&resized))
    }

    /// Write the mask into the alpha channel of an RGBA image
    ///
    /// # Errors
    /// - Image and mask dimensions do not match
    pub fn apply_to_image(&self, image: &mut RgbaImage) -> Result<()> {
        if image.dimensions() != self.dimensions {
            return Err(BgSwapError::format_mismatch(format!(
                "image is {}x{} but mask is {}x{}",
                image.width(),
                image.height(),
                self.dimensions.0,
                self.dimensions.1
            )));
        }

        for (pixel, &alpha) in image.pixels_mut().zip(self.data.iter()) {
            pixel[3] = alpha;
        }

        Ok(())
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&x| x > 127).count();
        let background_pixels = total_pixels - foreground_pixels;
        let total = total_pixels.max(1) as f32;

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: foreground_pixels as f32 / total,
            background_ratio: background_pixels as f32 / total,
        }
    }
}

/// Statistics about an alpha mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// Alpha-matted foreground: original subject color bound to a solved matte
///
/// Lives only between extraction and compositing within one pipeline
/// invocation; never persisted.
#[derive(Debug, Clone)]
pub struct Matte {
    image: RgbaImage,
}

impl Matte {
    /// Assemble a matte from source color and a solved alpha mask
    ///
    /// # Errors
    /// - Source and mask dimensions do not match (`Format`)
    pub fn from_parts(source: &RgbImage, mask: &AlphaMask) -> Result<Self> {
        if source.dimensions() != mask.dimensions {
            return Err(BgSwapError::format_mismatch(format!(
                "source is {}x{} but mask is {}x{}",
                source.width(),
                source.height(),
                mask.dimensions.0,
                mask.dimensions.1
            )));
        }

        let (width, height) = source.dimensions();
        let mut image = RgbaImage::new(width, height);
        for ((out, src), &alpha) in image
            .pixels_mut()
            .zip(source.pixels())
            .zip(mask.data.iter())
        {
            out.0 = [src[0], src[1], src[2], alpha];
        }

        Ok(Self { image })
    }

    /// Wrap an already-assembled RGBA raster as a matte
    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Pixel dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Borrow the RGBA raster
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the matte, returning the RGBA raster
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Extract the alpha channel as a standalone mask
    #[must_use]
    pub fn alpha_mask(&self) -> AlphaMask {
        let data = self.image.pixels().map(|p| p[3]).collect();
        AlphaMask::new(data, self.image.dimensions())
    }
}

/// Replacement scene raster, shared read-only across requests
///
/// Typically a fixed default asset decoded once at process scope. Cloning is
/// cheap (the raster is behind an `Arc`); the compositor resamples into a
/// new buffer, so the shared raster is never mutated in place.
#[derive(Debug, Clone)]
pub struct BackgroundImage {
    image: std::sync::Arc<image::DynamicImage>,
}

impl BackgroundImage {
    /// Load and decode a background asset from disk
    ///
    /// # Errors
    /// - File unreadable (`Io`)
    /// - Bytes not decodable as a raster image (`Decode`)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| BgSwapError::file_io_error("read background image", path.as_ref(), &e))?;
        Self::from_bytes(&bytes)
    }

    /// Decode a background asset from raw encoded bytes
    ///
    /// # Errors
    /// - Bytes not decodable as a raster image (`Decode`)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| BgSwapError::decode_failure("failed to decode background image", &e))?;
        Ok(Self::from_image(image))
    }

    /// Wrap an already-decoded raster
    #[must_use]
    pub fn from_image(image: image::DynamicImage) -> Self {
        Self {
            image: std::sync::Arc::new(image),
        }
    }

    /// Pixel dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Borrow the decoded raster
    #[must_use]
    pub fn as_image(&self) -> &image::DynamicImage {
        &self.image
    }
}

/// Final flattened composite, dimensions equal to the matte's
///
/// Created by the compositor, persisted once by the pipeline boundary,
/// immutable thereafter.
#[derive(Debug, Clone)]
pub struct CompositeOutput {
    /// The flattened opaque raster
    image: RgbImage,

    /// Stage timing breakdown for this invocation
    pub timings: StageTimings,
}

impl CompositeOutput {
    /// Create a new composite output
    #[must_use]
    pub fn new(image: RgbImage, timings: StageTimings) -> Self {
        Self { image, timings }
    }

    /// Pixel dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Borrow the flattened raster
    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Encode the composite in the given format
    ///
    /// # Errors
    /// - Image encoding failures
    pub fn to_bytes(&self, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        match format {
            OutputFormat::Png => {
                self.image
                    .write_to(&mut cursor, image::ImageFormat::Png)?;
            },
            OutputFormat::Jpeg => {
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, jpeg_quality);
                encoder.encode_image(&self.image)?;
            },
        }
        Ok(buffer)
    }

    /// Save the composite as PNG
    ///
    /// # Errors
    /// - File I/O or encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Save in the specified format
    ///
    /// # Errors
    /// - File I/O or encoding failures
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<()> {
        let bytes = self.to_bytes(format, jpeg_quality)?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| BgSwapError::file_io_error("write composite", path, &e))?;
        Ok(())
    }
}

/// Timing breakdown for one pipeline invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Input decoding
    pub decode_ms: u64,

    /// Segmentation capability call
    pub segment_ms: u64,

    /// Trimap refinement (zero when `refine` is off)
    pub refine_ms: u64,

    /// Background resample and compositing
    pub composite_ms: u64,

    /// Output encoding (when the artifact was persisted)
    pub encode_ms: Option<u64>,

    /// Total end-to-end time
    pub total_ms: u64,
}

impl StageTimings {
    /// One-line summary for log output
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Segment: {}ms | Refine: {}ms | Composite: {}ms",
            self.total_ms, self.decode_ms, self.segment_ms, self.refine_ms, self.composite_ms
        );
        if let Some(encode_ms) = self.encode_ms {
            summary.push_str(&format!(" | Encode: {}ms", encode_ms));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_alpha_mask_creation() {
        let mask = AlphaMask::new(vec![255, 128, 0, 255], (2, 2));
        assert_eq!(mask.dimensions, (2, 2));
        assert_eq!(mask.data.len(), 4);
        assert!(mask.to_image().is_ok());
    }

    #[test]
    fn test_alpha_mask_length_mismatch() {
        let mask = AlphaMask::new(vec![255, 128], (2, 2));
        assert!(matches!(mask.to_image(), Err(BgSwapError::Format(_))));
    }

    #[test]
    fn test_mask_statistics() {
        let mask = AlphaMask::new(vec![255, 255, 0, 0], (2, 2));
        let stats = mask.statistics();
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.foreground_pixels, 2);
        assert_eq!(stats.background_pixels, 2);
        assert_eq!(stats.foreground_ratio, 0.5);
    }

    #[test]
    fn test_mask_resize_preserves_range() {
        let mask = AlphaMask::new(vec![0, 255, 255, 0], (2, 2));
        let resized = mask.resize(8, 8).unwrap();
        assert_eq!(resized.dimensions, (8, 8));
        assert_eq!(resized.data.len(), 64);
    }

    #[test]
    fn test_apply_to_image_writes_alpha_channel() {
        let mask = AlphaMask::new(vec![0, 100, 200, 255], (2, 2));
        let mut image = RgbaImage::from_pixel(2, 2, image::Rgba([5, 6, 7, 255]));
        mask.apply_to_image(&mut image).unwrap();

        let alphas: Vec<u8> = image.pixels().map(|p| p[3]).collect();
        assert_eq!(alphas, vec![0, 100, 200, 255]);
        assert_eq!(image.get_pixel(0, 0).0[..3], [5, 6, 7]);
    }

    #[test]
    fn test_apply_to_image_dimension_check() {
        let mask = AlphaMask::new(vec![255; 4], (2, 2));
        let mut image = RgbaImage::new(3, 3);
        assert!(matches!(
            mask.apply_to_image(&mut image),
            Err(BgSwapError::Format(_))
        ));
    }

    #[test]
    fn test_matte_from_parts() {
        let source = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let mask = AlphaMask::new(vec![0, 64, 128, 255], (2, 2));
        let matte = Matte::from_parts(&source, &mask).unwrap();

        assert_eq!(matte.dimensions(), (2, 2));
        let image = matte.image();
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30, 0]);
        assert_eq!(image.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_matte_from_parts_rejects_mismatch() {
        let source = RgbImage::new(2, 2);
        let mask = AlphaMask::new(vec![255; 9], (3, 3));
        assert!(matches!(
            Matte::from_parts(&source, &mask),
            Err(BgSwapError::Format(_))
        ));
    }

    #[test]
    fn test_matte_alpha_roundtrip() {
        let source = RgbImage::from_pixel(2, 1, Rgb([1, 2, 3]));
        let mask = AlphaMask::new(vec![42, 200], (2, 1));
        let matte = Matte::from_parts(&source, &mask).unwrap();
        assert_eq!(matte.alpha_mask().data, vec![42, 200]);
    }

    #[test]
    fn test_background_image_from_bytes() {
        let raster = RgbImage::from_pixel(3, 5, Rgb([4, 5, 6]));
        let mut bytes = Vec::new();
        raster
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();

        let background = BackgroundImage::from_bytes(&bytes).unwrap();
        assert_eq!(background.dimensions(), (3, 5));

        // Clones share the decoded raster
        let clone = background.clone();
        assert_eq!(clone.dimensions(), (3, 5));
    }

    #[test]
    fn test_background_image_rejects_garbage() {
        assert!(matches!(
            BackgroundImage::from_bytes(b"not an image"),
            Err(BgSwapError::Decode(_))
        ));
    }

    #[test]
    fn test_composite_output_png_bytes() {
        let image = RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]));
        let output = CompositeOutput::new(image, StageTimings::default());
        let bytes = output.to_bytes(OutputFormat::Png, 90).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_timings_summary() {
        let timings = StageTimings {
            decode_ms: 1,
            segment_ms: 2,
            refine_ms: 3,
            composite_ms: 4,
            encode_ms: Some(5),
            total_ms: 15,
        };
        let summary = timings.summary();
        assert!(summary.contains("Total: 15ms"));
        assert!(summary.contains("Encode: 5ms"));
    }
}
