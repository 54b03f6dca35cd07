//! Deterministic matte-over-background compositing
//!
//! Layering order: opaque white canvas, then the background resampled to the
//! matte's dimensions, then the matte blended by its own alpha. The canvas is
//! a safety backdrop that only shows through where the background itself is
//! transparent. Output is flattened to an opaque raster.

use crate::error::{BgSwapError, Result};
use crate::types::{CompositeOutput, Matte, StageTimings};
use image::{DynamicImage, Rgba, RgbImage, RgbaImage};

/// Opaque white safety backdrop under the background layer
const CANVAS_BACKDROP: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Composite a matte onto a background image
///
/// The background is resampled to the matte's exact dimensions with a
/// Lanczos filter — never the reverse, so subject geometry is never
/// distorted — and always into a new buffer, leaving a shared background
/// asset untouched. For fixed inputs the output is byte-for-byte
/// reproducible.
///
/// # Errors
/// - Either input has a zero dimension (`Format`)
/// - Dimension mismatch after resampling (`Composite`, unreachable)
pub fn compose(matte: &Matte, background: &DynamicImage) -> Result<CompositeOutput> {
    let (width, height) = matte.dimensions();
    if width == 0 || height == 0 {
        return Err(BgSwapError::format_mismatch("matte has zero dimension"));
    }
    if background.width() == 0 || background.height() == 0 {
        return Err(BgSwapError::format_mismatch(
            "background has zero dimension",
        ));
    }

    // Resample the background to the foreground's size; allocates a new
    // raster so a shared background asset is never mutated in place.
    let background_rgba = background.to_rgba8();
    let resampled = image::imageops::resize(
        &background_rgba,
        width,
        height,
        image::imageops::FilterType::Lanczos3,
    );

    if resampled.dimensions() != (width, height) {
        return Err(BgSwapError::composite(format!(
            "background resampled to {}x{} instead of {}x{}",
            resampled.width(),
            resampled.height(),
            width,
            height
        )));
    }

    let mut canvas = RgbaImage::from_pixel(width, height, CANVAS_BACKDROP);
    blend_over(&mut canvas, &resampled);
    blend_over(&mut canvas, matte.image());

    // Flatten: the canvas started opaque and over-blending preserves full
    // coverage, so dropping the alpha channel loses nothing.
    let mut flattened = RgbImage::new(width, height);
    for (out, src) in flattened.pixels_mut().zip(canvas.pixels()) {
        out.0 = [src[0], src[1], src[2]];
    }

    Ok(CompositeOutput::new(flattened, StageTimings::default()))
}

/// Blend `layer` over `canvas` at origin using the layer's alpha channel
///
/// Linear interpolation per channel with round-half-up integer arithmetic:
/// alpha 255 replaces the canvas pixel exactly, alpha 0 leaves it exactly
/// untouched.
fn blend_over(canvas: &mut RgbaImage, layer: &RgbaImage) {
    debug_assert_eq!(canvas.dimensions(), layer.dimensions());

    for (dst, src) in canvas.pixels_mut().zip(layer.pixels()) {
        let alpha = u32::from(src[3]);
        let inverse = 255 - alpha;
        for c in 0..3 {
            let blended = (u32::from(src[c]) * alpha + u32::from(dst[c]) * inverse + 127) / 255;
            dst[c] = blended as u8;
        }
        dst[3] = 255;
    }
}
