//! Tract backend: local segmentation model inference in pure Rust
//!
//! Runs an ISNet-style salient-object model through Tract. No external
//! runtime dependencies, no FFI boundary, CPU only. The model is loaded once
//! at construction — model/session initialization has non-trivial cold-start
//! cost, so the handle is meant to be created at process scope and shared,
//! never rebuilt per request.

use crate::backends::SegmentationBackend;
use crate::error::{BgSwapError, Result};
use crate::types::AlphaMask;
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageBuffer, Rgb};
use ndarray::Array4;
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

// Use instant crate for cross-platform time compatibility
use instant::Instant;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Default square input size for ISNet-style models
const DEFAULT_TARGET_SIZE: u32 = 1024;

/// Default channel normalization (ImageNet statistics)
const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Local segmentation backend running an ONNX model through Tract
pub struct TractBackend {
    model: TractModel,
    target_size: u32,
    normalization_mean: [f32; 3],
    normalization_std: [f32; 3],
}

impl std::fmt::Debug for TractBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractBackend")
            .field("target_size", &self.target_size)
            .finish_non_exhaustive()
    }
}

impl TractBackend {
    /// Load a model from disk with default preprocessing parameters
    ///
    /// # Errors
    /// - Model file unreadable (`Io`)
    /// - ONNX parsing, optimization or plan-building failures (`Model`)
    pub fn from_model_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder(path).build()
    }

    /// Create a backend builder
    pub fn builder<P: AsRef<Path>>(path: P) -> TractBackendBuilder {
        TractBackendBuilder {
            model_path: path.as_ref().to_path_buf(),
            target_size: DEFAULT_TARGET_SIZE,
            normalization_mean: DEFAULT_MEAN,
            normalization_std: DEFAULT_STD,
        }
    }

    /// Run inference on a preprocessed input tensor
    #[allow(clippy::indexing_slicing)] // Safe: shape length validated before indexing
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = self.model.run(tvec![input_tensor.into()]).map_err(|e| {
            BgSwapError::extraction(format!("Tract inference failed: {}", e))
        })?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgSwapError::extraction("no output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgSwapError::extraction(format!("failed to convert output tensor: {}", e))
        })?;

        let shape = output_data.shape();
        if shape.len() != 4 {
            return Err(BgSwapError::extraction(format!(
                "expected 4D output tensor, got {}D",
                shape.len()
            )));
        }

        let dims = (shape[0], shape[1], shape[2], shape[3]);
        let output = Array4::from_shape_vec(
            dims,
            output_data.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| {
            BgSwapError::extraction(format!("failed to reshape output tensor: {}", e))
        })?;

        log::debug!(
            "Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );

        Ok(output)
    }
}

#[async_trait]
impl SegmentationBackend for TractBackend {
    async fn segment(&self, image_bytes: &[u8]) -> Result<AlphaMask> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| BgSwapError::decode_failure("failed to decode input image", &e))?;
        let original_dimensions = (image.width(), image.height());

        let input = preprocess(
            &image,
            self.target_size,
            self.normalization_mean,
            self.normalization_std,
        );
        let output = self.infer(&input)?;
        mask_from_output(&output, original_dimensions)
    }

    fn name(&self) -> &str {
        "tract"
    }
}

/// Builder for `TractBackend`
#[derive(Debug)]
pub struct TractBackendBuilder {
    model_path: PathBuf,
    target_size: u32,
    normalization_mean: [f32; 3],
    normalization_std: [f32; 3],
}

impl TractBackendBuilder {
    /// Override the model's square input size
    #[must_use]
    pub fn target_size(mut self, size: u32) -> Self {
        self.target_size = size;
        self
    }

    /// Override channel normalization statistics
    #[must_use]
    pub fn normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.normalization_mean = mean;
        self.normalization_std = std;
        self
    }

    /// Load the model and build the backend
    ///
    /// # Errors
    /// - Model file unreadable (`Io`)
    /// - ONNX parsing, optimization or plan-building failures (`Model`)
    /// - Zero target size (`InvalidConfig`)
    pub fn build(self) -> Result<TractBackend> {
        if self.target_size == 0 {
            return Err(BgSwapError::config_value_error(
                "target_size",
                self.target_size,
                "1-4096",
            ));
        }

        let model_load_start = Instant::now();
        let model_data = std::fs::read(&self.model_path)
            .map_err(|e| BgSwapError::file_io_error("read model file", &self.model_path, &e))?;

        log::info!(
            "Loading segmentation model from {} ({} bytes)",
            self.model_path.display(),
            model_data.len()
        );

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| BgSwapError::model(format!("failed to load ONNX model: {}", e)))?
            .into_optimized()
            .map_err(|e| BgSwapError::model(format!("failed to optimize model: {}", e)))?
            .into_runnable()
            .map_err(|e| BgSwapError::model(format!("failed to create runnable model: {}", e)))?;

        log::info!(
            "Tract backend initialized in {}ms",
            model_load_start.elapsed().as_millis()
        );

        Ok(TractBackend {
            model,
            target_size: self.target_size,
            normalization_mean: self.normalization_mean,
            normalization_std: self.normalization_std,
        })
    }
}

/// Preprocess an image into a normalized NCHW tensor
///
/// Aspect-preserving resize, centered on a white square canvas of
/// `target_size`, channels normalized with the given statistics.
#[allow(clippy::indexing_slicing)] // Safe: tensor pre-allocated to canvas size
fn preprocess(
    image: &DynamicImage,
    target_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
) -> Array4<f32> {
    let rgb_image = image.to_rgb8();
    let (orig_width, orig_height) = rgb_image.dimensions();

    let (scaled_width, scaled_height) =
        scaled_dimensions(orig_width, orig_height, target_size);

    let resized = image::imageops::resize(
        &rgb_image,
        scaled_width,
        scaled_height,
        image::imageops::FilterType::Triangle,
    );

    // Center the resized image on a white canvas
    let mut canvas: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(target_size, target_size, Rgb([255, 255, 255]));
    let offset_x = (target_size - scaled_width) / 2;
    let offset_y = (target_size - scaled_height) / 2;
    image::imageops::replace(&mut canvas, &resized, i64::from(offset_x), i64::from(offset_y));

    let size = target_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (y, row) in canvas.rows().enumerate() {
        for (x, pixel) in row.enumerate() {
            for c in 0..3 {
                tensor[[0, c, y, x]] = (f32::from(pixel[c]) / 255.0 - mean[c]) / std[c];
            }
        }
    }

    tensor
}

/// Aspect-preserving dimensions fitting inside a square of `target_size`
fn scaled_dimensions(width: u32, height: u32, target_size: u32) -> (u32, u32) {
    let target = target_size as f32;
    let scale = (target / width as f32).min(target / height as f32);
    let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
    let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);
    (scaled_width, scaled_height)
}

/// Convert the model's output map back to a mask at the original resolution
///
/// Reverses the preprocessing geometry: crops the centered subject region
/// out of the square output map, min-max normalizes it, and resamples to the
/// original dimensions.
#[allow(clippy::indexing_slicing)] // Safe: crop region bounds-checked against the tensor shape
fn mask_from_output(output: &Array4<f32>, original_dimensions: (u32, u32)) -> Result<AlphaMask> {
    let shape = output.shape();
    if shape[0] != 1 || shape[1] < 1 {
        return Err(BgSwapError::extraction(format!(
            "unexpected output tensor shape {:?}",
            shape
        )));
    }

    let out_height = shape[2] as u32;
    let out_width = shape[3] as u32;
    if out_width != out_height {
        return Err(BgSwapError::extraction(format!(
            "expected a square output map, got {}x{}",
            out_width, out_height
        )));
    }

    let (orig_width, orig_height) = original_dimensions;
    let (scaled_width, scaled_height) = scaled_dimensions(orig_width, orig_height, out_width);
    let offset_x = (out_width - scaled_width) / 2;
    let offset_y = (out_height - scaled_height) / 2;

    // Min-max over the subject crop only; padding would skew the range
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for y in 0..scaled_height {
        for x in 0..scaled_width {
            let v = output[[0, 0, (offset_y + y) as usize, (offset_x + x) as usize]];
            min = min.min(v);
            max = max.max(v);
        }
    }

    let range = max - min;
    let mut crop = GrayImage::new(scaled_width, scaled_height);
    for (x, y, pixel) in crop.enumerate_pixels_mut() {
        let v = output[[0, 0, (offset_y + y) as usize, (offset_x + x) as usize]];
        let normalized = if range > f32::EPSILON {
            (v - min) / range
        } else {
            v.clamp(0.0, 1.0)
        };
        pixel.0 = [(normalized * 255.0).round() as u8];
    }

    AlphaMask::from_image(&crop).resize(orig_width, orig_height)
}
