// ============================================================================
// EFFECTS — edge detection, emboss, eye reduction, and filter dispatch
// ============================================================================
//
// Edge operators work on the luminance plane and broadcast the result back
// to three channels. Eye reduction is a mask-gated substitution: pixels
// outside the mask are never touched.
// ============================================================================

use rayon::prelude::*;

use super::adjustments::saturate;
use super::filters::{self, luminance};
use crate::error::EditorResult;
use crate::params::{EYE_LEVEL, EYE_THRESHOLD, EffectKind, EffectParams, EyeColor};
use crate::raster::{B, CHANNELS, G, R, RasterBuffer};

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Luminance plane of the buffer, one byte per pixel.
fn luminance_plane(buf: &RasterBuffer) -> Vec<u8> {
    buf.as_raw()
        .par_chunks_exact(CHANNELS)
        .map(|px| luminance(px[B], px[G], px[R]))
        .collect()
}

/// Correlate a 3x3 kernel over a single-channel plane, edge-clamped.
/// `finish` turns the raw response into the output byte.
fn convolve_plane_3x3<F>(
    plane: &[u8],
    w: usize,
    h: usize,
    kernel: &[[f32; 3]; 3],
    finish: F,
) -> Vec<u8>
where
    F: Fn(f32) -> u8 + Sync,
{
    let mut out = vec![0u8; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        for (x, slot) in row_out.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for (ky, krow) in kernel.iter().enumerate() {
                let sy = (y as isize + ky as isize - 1).clamp(0, h as isize - 1) as usize;
                for (kx, &kv) in krow.iter().enumerate() {
                    let sx = (x as isize + kx as isize - 1).clamp(0, w as isize - 1) as usize;
                    acc += plane[sy * w + sx] as f32 * kv;
                }
            }
            *slot = finish(acc);
        }
    });
    out
}

/// Write a single-channel plane into all three channels.
fn broadcast_plane(buf: &mut RasterBuffer, plane: &[u8]) {
    buf.as_raw_mut()
        .par_chunks_exact_mut(CHANNELS)
        .zip(plane.par_iter())
        .for_each(|(px, &v)| px.fill(v));
}

// ============================================================================
// EDGE DETECTION
// ============================================================================

const SOBEL_X: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Aperture-3 Laplacian.
const LAPLACIAN: [[f32; 3]; 3] = [[2.0, 0.0, 2.0], [0.0, -8.0, 0.0], [2.0, 0.0, 2.0]];

/// Diagonal relief with a unit centre, so flat regions keep their value.
const EMBOSS: [[f32; 3]; 3] = [[-2.0, -1.0, 0.0], [-1.0, 1.0, 1.0], [0.0, 1.0, 2.0]];

/// First-derivative (Sobel) gradient magnitude of the luminance.
pub fn edge_detection(buf: &mut RasterBuffer) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let w = buf.width() as usize;
    let h = buf.height() as usize;
    let gray = luminance_plane(buf);

    let mut magnitude = vec![0u8; w * h];
    magnitude
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row_out)| {
            let lum = |px: isize, py: isize| -> f32 {
                let cx = px.clamp(0, w as isize - 1) as usize;
                let cy = py.clamp(0, h as isize - 1) as usize;
                gray[cy * w + cx] as f32
            };
            for (x, slot) in row_out.iter_mut().enumerate() {
                let (ix, iy) = (x as isize, y as isize);
                let mut gx = 0.0f32;
                let mut gy = 0.0f32;
                for ky in 0..3 {
                    for kx in 0..3 {
                        let v = lum(ix + kx as isize - 1, iy + ky as isize - 1);
                        gx += SOBEL_X[ky][kx] * v;
                        gy += SOBEL_Y[ky][kx] * v;
                    }
                }
                *slot = saturate((gx * gx + gy * gy).sqrt());
            }
        });

    broadcast_plane(buf, &magnitude);
    Ok(())
}

/// Second-derivative (Laplacian) response of the luminance, absolute value.
pub fn edge_detection_laplacian(buf: &mut RasterBuffer) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let w = buf.width() as usize;
    let h = buf.height() as usize;
    let gray = luminance_plane(buf);
    let edges = convolve_plane_3x3(&gray, w, h, &LAPLACIAN, |v| saturate(v.abs()));
    broadcast_plane(buf, &edges);
    Ok(())
}

/// Emboss kernel convolved over every channel independently.
pub fn emboss(buf: &mut RasterBuffer) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let w = buf.width() as usize;
    let h = buf.height() as usize;
    for c in 0..CHANNELS {
        let plane: Vec<u8> = buf.as_raw().iter().skip(c).step_by(CHANNELS).copied().collect();
        let out = convolve_plane_3x3(&plane, w, h, &EMBOSS, saturate);
        for (px, v) in buf.as_raw_mut().chunks_exact_mut(CHANNELS).zip(out) {
            px[c] = v;
        }
    }
    Ok(())
}

// ============================================================================
// EYE REDUCTION
// ============================================================================

impl EyeColor {
    /// Channel index being reduced.
    fn channel(self) -> usize {
        match self {
            EyeColor::Red => R,
            EyeColor::Green => G,
            EyeColor::Blue => B,
        }
    }

    /// How much the target must dominate each other channel.
    /// Red-eye artifacts are more saturated, hence the stricter ratio.
    pub fn dominance_ratio(self) -> f32 {
        match self {
            EyeColor::Red => 1.5,
            EyeColor::Green | EyeColor::Blue => 1.3,
        }
    }

    /// Replacement value for the target channel of a masked pixel.
    fn substitute(self, px: &[u8]) -> f32 {
        match self {
            EyeColor::Red => px[G] as f32,
            EyeColor::Green => saturate(0.5 * px[B] as f32 + 0.5 * px[R] as f32) as f32,
            EyeColor::Blue => saturate(0.5 * px[G] as f32 + 0.5 * px[R] as f32) as f32,
        }
    }
}

/// True when the pixel belongs to the eye-reduction mask for `color`.
pub fn in_eye_mask(px: &[u8], color: EyeColor, threshold: i32) -> bool {
    let target = color.channel();
    let t = px[target] as f32;
    if t <= threshold as f32 {
        return false;
    }
    let ratio = color.dominance_ratio();
    // Scaled channels are 8-bit: round half to even, then saturate.
    (0..CHANNELS)
        .filter(|&c| c != target)
        .all(|c| t > (px[c] as f32 * ratio).round_ties_even().min(255.0))
}

/// Mask-gated colour substitution.
///
/// `threshold`: 100..255. `level`: 0..100 interpolates between the untouched
/// channel (0) and the full substitution (100); `None` substitutes fully.
pub fn eye_reduction(
    buf: &mut RasterBuffer,
    color: EyeColor,
    threshold: i32,
    level: Option<i32>,
) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let threshold = EYE_THRESHOLD.clamp_int(threshold);
    let strength = level.map_or(1.0, |l| EYE_LEVEL.clamp_int(l) as f32 / 100.0);
    let target = color.channel();
    let stride = buf.stride();

    let touched: usize = buf
        .as_raw_mut()
        .par_chunks_mut(stride)
        .map(|row| {
            let mut count = 0;
            for px in row.chunks_exact_mut(CHANNELS) {
                if !in_eye_mask(px, color, threshold) {
                    continue;
                }
                let current = px[target] as f32;
                let replacement = color.substitute(px);
                px[target] = saturate(current + (replacement - current) * strength);
                count += 1;
            }
            count
        })
        .sum();

    tracing::debug!(color = color.label(), threshold, touched, "eye reduction");
    Ok(())
}

pub fn red_eye_reduction(buf: &mut RasterBuffer, threshold: i32, level: Option<i32>) -> EditorResult<()> {
    eye_reduction(buf, EyeColor::Red, threshold, level)
}

pub fn green_eye_reduction(buf: &mut RasterBuffer, threshold: i32, level: Option<i32>) -> EditorResult<()> {
    eye_reduction(buf, EyeColor::Green, threshold, level)
}

pub fn blue_eye_reduction(buf: &mut RasterBuffer, threshold: i32, level: Option<i32>) -> EditorResult<()> {
    eye_reduction(buf, EyeColor::Blue, threshold, level)
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Apply one discrete filter, reading its parameters from `params`.
/// Non-filter kinds (adjustment families, `None`) leave the buffer as is.
pub fn apply_filter(buf: &mut RasterBuffer, kind: EffectKind, params: &EffectParams) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    match kind {
        EffectKind::Grayscale => filters::grayscale(buf),
        EffectKind::Sepia => filters::sepia(buf),
        EffectKind::Negative => filters::negative(buf),
        EffectKind::Blur => filters::gaussian_blur(buf, params.blur_sigma),
        EffectKind::Sharpen => filters::sharpen(buf, params.sharpen_amount),
        EffectKind::MedianFilter => filters::median_filter(buf, params.median_radius),
        EffectKind::BoxBlur => filters::box_blur(buf, params.box_radius),
        EffectKind::EdgeDetection => edge_detection(buf),
        EffectKind::EdgeDetectionLaplacian => edge_detection_laplacian(buf),
        EffectKind::Emboss => emboss(buf),
        EffectKind::RedEyeReduction
        | EffectKind::GreenEyeReduction
        | EffectKind::BlueEyeReduction => {
            let Some(color) = kind.eye_color() else {
                return Ok(());
            };
            let eye = params.eye(color);
            eye_reduction(buf, color, eye.threshold, Some(eye.level))
        }
        EffectKind::None | EffectKind::BasicAdjustments | EffectKind::ColorAdjustments => Ok(()),
    }
}
