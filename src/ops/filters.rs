// ============================================================================
// IMAGE FILTERS — colour filters, Gaussian/box blur, median, sharpen
// ============================================================================
//
// Neighbourhood filters read a copy of the source and sample clamped to the
// image edge. Passes are parallelized by row.
// ============================================================================

use rayon::prelude::*;

use super::adjustments::saturate;
use crate::error::EditorResult;
use crate::params::{BLUR_SIGMA, BOX_RADIUS, MEDIAN_RADIUS, SHARPEN_AMOUNT};
use crate::raster::{B, CHANNELS, G, R, RasterBuffer};

/// Fixed sigma of the blurred copy used by the unsharp mask.
pub const SHARPEN_SIGMA: f32 = 3.0;

// ============================================================================
// COLOUR FILTERS
// ============================================================================

/// Luminosity grayscale (0.299 R + 0.587 G + 0.114 B), broadcast to all
/// three channels.
pub fn grayscale(buf: &mut RasterBuffer) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let stride = buf.stride();
    buf.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(CHANNELS) {
            let y = luminance(px[B], px[G], px[R]);
            px.fill(y);
        }
    });
    Ok(())
}

#[inline]
pub(crate) fn luminance(b: u8, g: u8, r: u8) -> u8 {
    saturate(0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
}

/// Classic sepia tone matrix.
pub fn sepia(buf: &mut RasterBuffer) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let stride = buf.stride();
    buf.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(CHANNELS) {
            let (b, g, r) = (px[B] as f32, px[G] as f32, px[R] as f32);
            let sr = 0.393 * r + 0.769 * g + 0.189 * b;
            let sg = 0.349 * r + 0.686 * g + 0.168 * b;
            let sb = 0.272 * r + 0.534 * g + 0.131 * b;
            px[B] = saturate(sb);
            px[G] = saturate(sg);
            px[R] = saturate(sr);
        }
    });
    Ok(())
}

/// Bitwise complement of every channel.
pub fn negative(buf: &mut RasterBuffer) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let stride = buf.stride();
    buf.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for v in row.iter_mut() {
            *v = !*v;
        }
    });
    Ok(())
}

// ============================================================================
// BLURS
// ============================================================================

/// Gaussian blur. `sigma`: 0.1..50, kernel size `2 * floor(3 * sigma) + 1`.
pub fn gaussian_blur(buf: &mut RasterBuffer, sigma: f32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let sigma = BLUR_SIGMA.clamp(sigma);
    let kernel = build_gaussian_kernel(sigma);
    if kernel.len() == 1 {
        return Ok(());
    }
    let blurred = separable_convolve(buf, &kernel);
    write_back(buf, &blurred);
    Ok(())
}

/// Uniform box filter. `radius`: 1..20, kernel size `2 * radius + 1`.
pub fn box_blur(buf: &mut RasterBuffer, radius: i32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let radius = BOX_RADIUS.clamp_int(radius) as usize;
    let size = radius * 2 + 1;
    let kernel = vec![1.0 / size as f32; size];
    let blurred = separable_convolve(buf, &kernel);
    write_back(buf, &blurred);
    Ok(())
}

/// Normalised 1-D Gaussian kernel with radius `floor(3 * sigma)`.
pub(crate) fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).floor() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let inv = 1.0 / kernel.iter().sum::<f32>();
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Horizontal then vertical pass of a symmetric odd-length kernel.
/// Returns unclamped f32 samples in buffer layout.
fn separable_convolve(buf: &RasterBuffer, kernel: &[f32]) -> Vec<f32> {
    let w = buf.width() as usize;
    let h = buf.height() as usize;
    let stride = buf.stride();
    let radius = kernel.len() / 2;
    let src = buf.as_raw();

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; src.len()];
    buf_h
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src[y * stride..(y + 1) * stride];
            for x in 0..w {
                let mut acc = [0.0f32; CHANNELS];
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = (x as isize + ki as isize - radius as isize).clamp(0, w as isize - 1)
                        as usize;
                    let si = sx * CHANNELS;
                    for c in 0..CHANNELS {
                        acc[c] += row_in[si + c] as f32 * kv;
                    }
                }
                row_out[x * CHANNELS..(x + 1) * CHANNELS].copy_from_slice(&acc);
            }
        });

    // --- Vertical pass (parallel by row) ---
    let mut buf_v = vec![0.0f32; src.len()];
    buf_v
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            for x in 0..w {
                let mut acc = [0.0f32; CHANNELS];
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = (y as isize + ki as isize - radius as isize).clamp(0, h as isize - 1)
                        as usize;
                    let si = sy * stride + x * CHANNELS;
                    for c in 0..CHANNELS {
                        acc[c] += buf_h[si + c] * kv;
                    }
                }
                row_out[x * CHANNELS..(x + 1) * CHANNELS].copy_from_slice(&acc);
            }
        });

    buf_v
}

fn write_back(buf: &mut RasterBuffer, samples: &[f32]) {
    buf.as_raw_mut()
        .par_iter_mut()
        .zip(samples.par_iter())
        .for_each(|(dst, &v)| *dst = saturate(v));
}

// ============================================================================
// MEDIAN
// ============================================================================

/// Per-channel median. `radius`: 1..10, kernel size `2 * radius + 1`.
pub fn median_filter(buf: &mut RasterBuffer, radius: i32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let r = MEDIAN_RADIUS.clamp_int(radius) as isize;
    let w = buf.width() as usize;
    let h = buf.height() as usize;
    let stride = buf.stride();
    let src = buf.as_raw().to_vec();

    buf.as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let mut window: Vec<u8> = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
            for x in 0..w {
                for c in 0..CHANNELS {
                    window.clear();
                    for dy in -r..=r {
                        let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                        for dx in -r..=r {
                            let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                            window.push(src[sy * stride + sx * CHANNELS + c]);
                        }
                    }
                    let mid = window.len() / 2;
                    let (_, median, _) = window.select_nth_unstable(mid);
                    row_out[x * CHANNELS + c] = *median;
                }
            }
        });
    Ok(())
}

// ============================================================================
// SHARPEN
// ============================================================================

/// Unsharp mask: `out = in * (1 + amount) - blurred * amount`, where the
/// blurred copy uses a fixed sigma of 3. `amount`: 0..5.
pub fn sharpen(buf: &mut RasterBuffer, amount: f32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let amount = SHARPEN_AMOUNT.clamp(amount);
    if amount == 0.0 {
        return Ok(());
    }
    let blurred = separable_convolve(buf, &build_gaussian_kernel(SHARPEN_SIGMA));
    buf.as_raw_mut()
        .par_iter_mut()
        .zip(blurred.par_iter())
        .for_each(|(dst, &bl)| {
            // The blurred copy is rounded to bytes first, as a stored image would be.
            let bl = saturate(bl) as f32;
            *dst = saturate(*dst as f32 * (1.0 + amount) - bl * amount);
        });
    Ok(())
}
