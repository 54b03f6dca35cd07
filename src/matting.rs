//! Trimap construction and alpha-matting refinement
//!
//! A segmentation backend produces a hard-edged confidence mask. Refinement
//! partitions that mask into definite-foreground, definite-background and an
//! uncertain band, erodes both definite regions to widen the band, then
//! solves for sub-pixel alpha inside the band only. Definite regions keep
//! their original values. This is what turns a noisy cutout into a usable
//! matte around hair strands and semi-transparent edges.

use crate::config::MatteOptions;
use crate::error::{BgSwapError, Result};
use crate::types::AlphaMask;
use image::RgbImage;

/// Trimap label for definite background
pub const TRIMAP_BACKGROUND: u8 = 0;
/// Trimap label for the uncertain band
pub const TRIMAP_UNKNOWN: u8 = 128;
/// Trimap label for definite foreground
pub const TRIMAP_FOREGROUND: u8 = 255;

/// Relaxation sweeps over the uncertain band
const SOLVER_SWEEPS: usize = 40;

/// Color-affinity falloff: squared distance scale in 8-bit channel units.
/// Neighbors closer in color than ~30 per channel pull strongly on each
/// other's alpha; dissimilar neighbors barely couple.
const AFFINITY_SCALE: f32 = 2.0 * 30.0 * 30.0;

/// Three-region classification scoping alpha refinement
#[derive(Debug, Clone)]
pub struct Trimap {
    labels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Trimap {
    /// Build a trimap from an initial alpha estimate
    ///
    /// Pixels above `foreground_threshold` are definite foreground, below
    /// `background_threshold` definite background, the rest uncertain. Both
    /// definite regions are then eroded by `erode_size`; out-of-image pixels
    /// count as background during erosion, so a background region touching
    /// the border survives while a foreground region touching it recedes.
    ///
    /// # Errors
    /// - Mask data length does not match its stated dimensions
    pub fn from_mask(mask: &AlphaMask, options: &MatteOptions) -> Result<Self> {
        let (width, height) = mask.dimensions;
        let expected = width as usize * height as usize;
        if mask.data.len() != expected {
            return Err(BgSwapError::format_mismatch(format!(
                "mask data length {} does not match {}x{}",
                mask.data.len(),
                width,
                height
            )));
        }

        let mut is_foreground: Vec<bool> = mask
            .data
            .iter()
            .map(|&a| a > options.foreground_threshold)
            .collect();
        let mut is_background: Vec<bool> = mask
            .data
            .iter()
            .map(|&a| a < options.background_threshold)
            .collect();

        if options.erode_size > 0 {
            is_foreground = erode(&is_foreground, width, height, options.erode_size, false);
            is_background = erode(&is_background, width, height, options.erode_size, true);
        }

        let labels = is_foreground
            .iter()
            .zip(is_background.iter())
            .map(|(&fg, &bg)| {
                if fg {
                    TRIMAP_FOREGROUND
                } else if bg {
                    TRIMAP_BACKGROUND
                } else {
                    TRIMAP_UNKNOWN
                }
            })
            .collect();

        Ok(Self {
            labels,
            width,
            height,
        })
    }

    /// Label at (x, y)
    #[must_use]
    #[allow(clippy::indexing_slicing)] // Safe: label buffer sized to width*height
    pub fn label(&self, x: u32, y: u32) -> u8 {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// Raw label buffer, row-major
    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Trimap dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of definite-foreground pixels
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|&&l| l == TRIMAP_FOREGROUND)
            .count()
    }

    /// Number of uncertain pixels
    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == TRIMAP_UNKNOWN).count()
    }
}

/// Binary erosion with a square structuring element of the given radius
///
/// Separable min-filter: a pixel survives only if every sample in its
/// `(2r+1)^2` window is set. Out-of-image samples take `border_value`.
#[allow(clippy::indexing_slicing)] // Safe: all indices bounds-checked against w/h
fn erode(mask: &[bool], width: u32, height: u32, radius: u32, border_value: bool) -> Vec<bool> {
    let w = width as usize;
    let h = height as usize;
    let r = radius as i64;

    // Horizontal pass
    let mut pass = vec![false; mask.len()];
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let mut keep = mask[row + x];
            for dx in -r..=r {
                if !keep {
                    break;
                }
                let nx = x as i64 + dx;
                keep = if nx < 0 || nx >= w as i64 {
                    border_value
                } else {
                    mask[row + nx as usize]
                };
            }
            pass[row + x] = keep;
        }
    }

    // Vertical pass
    let mut out = vec![false; mask.len()];
    for y in 0..h {
        for x in 0..w {
            let mut keep = pass[y * w + x];
            for dy in -r..=r {
                if !keep {
                    break;
                }
                let ny = y as i64 + dy;
                keep = if ny < 0 || ny >= h as i64 {
                    border_value
                } else {
                    pass[ny as usize * w + x]
                };
            }
            out[y * w + x] = keep;
        }
    }

    out
}

/// Solve sub-pixel alpha inside the trimap's uncertain band
///
/// Deterministic Jacobi relaxation of a color-affinity weighted Laplacian:
/// each sweep replaces an uncertain pixel's alpha with the affinity-weighted
/// average of its 8-neighborhood, with definite pixels as fixed boundary
/// conditions. Uncertain alpha starts from the backend's estimate, so
/// isolated bands without boundary contact converge near their initial
/// values instead of drifting.
///
/// # Errors
/// - Source and mask dimensions do not match (`Format`)
#[allow(clippy::indexing_slicing)] // Safe: buffers sized to the validated dimensions
pub fn refine_alpha(
    source: &RgbImage,
    mask: &AlphaMask,
    options: &MatteOptions,
) -> Result<AlphaMask> {
    if source.dimensions() != mask.dimensions {
        return Err(BgSwapError::format_mismatch(format!(
            "source is {}x{} but mask is {}x{}",
            source.width(),
            source.height(),
            mask.dimensions.0,
            mask.dimensions.1
        )));
    }

    let trimap = Trimap::from_mask(mask, options)?;
    if trimap.unknown_count() == 0 {
        return Ok(mask.clone());
    }

    let w = mask.dimensions.0 as usize;
    let h = mask.dimensions.1 as usize;
    let raw = source.as_raw();

    let mut alpha: Vec<f32> = mask.data.iter().map(|&a| f32::from(a) / 255.0).collect();
    let mut next = alpha.clone();

    let unknown: Vec<usize> = trimap
        .labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == TRIMAP_UNKNOWN)
        .map(|(i, _)| i)
        .collect();

    const NEIGHBORS: [(i64, i64); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    for _ in 0..SOLVER_SWEEPS {
        for &i in &unknown {
            let x = (i % w) as i64;
            let y = (i / w) as i64;

            let mut weight_sum = 0.0f32;
            let mut alpha_sum = 0.0f32;
            for (dx, dy) in NEIGHBORS {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                let weight = color_affinity(raw, i, j);
                weight_sum += weight;
                alpha_sum += weight * alpha[j];
            }

            if weight_sum > f32::EPSILON {
                next[i] = alpha_sum / weight_sum;
            }
        }
        std::mem::swap(&mut alpha, &mut next);
    }

    let data = alpha
        .iter()
        .map(|&a| (a.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();

    Ok(AlphaMask::new(data, mask.dimensions))
}

/// Affinity between two pixels of a packed RGB buffer
#[inline]
#[allow(clippy::indexing_slicing)] // Safe: callers pass in-bounds pixel indices
fn color_affinity(raw: &[u8], i: usize, j: usize) -> f32 {
    let a = &raw[i * 3..i * 3 + 3];
    let b = &raw[j * 3..j * 3 + 3];
    let mut dist_sq = 0.0f32;
    for c in 0..3 {
        let d = f32::from(a[c]) - f32::from(b[c]);
        dist_sq += d * d;
    }
    (-dist_sq / AFFINITY_SCALE).exp()
}
