// ============================================================================
// ADJUSTMENT OPERATIONS — tone and colour adjustments (in place, parallel)
// ============================================================================
//
// Each adjustment clamps its parameter, is a byte-for-byte no-op at its
// neutral value, and saturates results into 0..=255.
// Rows are processed in parallel via rayon.
// ============================================================================

use rayon::prelude::*;

use crate::error::{EditorError, EditorResult};
use crate::params::{
    AdjustmentFamily, BRIGHTNESS, CHANNEL_OFFSET, CONTRAST, EffectParams, GAMMA, GAMMA_EPSILON,
    HUE, SATURATION,
};
use crate::raster::{CHANNELS, RasterBuffer};
use crate::scheduler::CancelToken;

// ============================================================================
// HELPERS
// ============================================================================

/// Apply a per-pixel transform in place.
/// `transform` receives (b, g, r) as f32 and returns (b, g, r) as f32.
fn apply_pixel_transform<F>(buf: &mut RasterBuffer, transform: F) -> EditorResult<()>
where
    F: Fn(f32, f32, f32) -> (f32, f32, f32) + Sync,
{
    buf.ensure_not_empty()?;
    let stride = buf.stride();
    buf.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(CHANNELS) {
            let (nb, ng, nr) = transform(px[0] as f32, px[1] as f32, px[2] as f32);
            px[0] = saturate(nb);
            px[1] = saturate(ng);
            px[2] = saturate(nr);
        }
    });
    Ok(())
}

/// Map every channel byte through a 256-entry table.
pub(crate) fn apply_lut(buf: &mut RasterBuffer, lut: &[u8; 256]) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let stride = buf.stride();
    buf.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for v in row.iter_mut() {
            *v = lut[*v as usize];
        }
    });
    Ok(())
}

/// Round and clamp into the byte domain.
#[inline]
pub(crate) fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// ============================================================================
// BASIC ADJUSTMENTS
// ============================================================================

/// `amount`: -100..100, adds `amount * 2.55` to every channel.
pub fn adjust_brightness(buf: &mut RasterBuffer, amount: f32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let amount = BRIGHTNESS.clamp(amount);
    if amount == BRIGHTNESS.default {
        return Ok(());
    }
    let offset = amount * 2.55;
    apply_pixel_transform(buf, move |b, g, r| (b + offset, g + offset, r + offset))
}

/// `amount`: -100..100, scales every channel by `(100 + amount) / 100`.
pub fn adjust_contrast(buf: &mut RasterBuffer, amount: f32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let amount = CONTRAST.clamp(amount);
    if amount == CONTRAST.default {
        return Ok(());
    }
    let factor = (100.0 + amount) / 100.0;
    apply_pixel_transform(buf, move |b, g, r| (b * factor, g * factor, r * factor))
}

/// `gamma`: 0.1..3.0, `out = 255 * (in / 255)^(1 / gamma)` via lookup table.
pub fn adjust_gamma(buf: &mut RasterBuffer, gamma: f32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let gamma = GAMMA.clamp(gamma);
    if gamma == GAMMA.default {
        return Ok(());
    }
    apply_lut(buf, &build_gamma_lut(gamma))
}

fn build_gamma_lut(gamma: f32) -> [u8; 256] {
    let inv = 1.0 / gamma as f64;
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let v = (i as f64 / 255.0).powf(inv) * 255.0;
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

// ============================================================================
// COLOUR ADJUSTMENTS
// ============================================================================

/// `amount`: -100..100, scales HSV saturation by `1 + amount / 100`.
pub fn adjust_saturation(buf: &mut RasterBuffer, amount: f32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let amount = SATURATION.clamp(amount);
    if amount == SATURATION.default {
        return Ok(());
    }
    let factor = 1.0 + amount / 100.0;
    apply_hsv_transform(buf, move |h, s, v| (h, saturate(s as f32 * factor), v))
}

/// `degrees`: -180..180. Hue is stored on a half scale (0..179), so the
/// shift is `degrees / 2` and wraps around the colour wheel.
pub fn adjust_hue(buf: &mut RasterBuffer, degrees: f32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let degrees = HUE.clamp(degrees);
    if degrees == HUE.default {
        return Ok(());
    }
    let shift = degrees / 2.0;
    apply_hsv_transform(buf, move |h, s, v| {
        let shifted = (h as f32 + shift).round() as i32;
        (shifted.rem_euclid(HUE_STEPS as i32) as u8, s, v)
    })
}

/// Per-channel offsets, each -100..100, scaled by 2.55.
pub fn adjust_rgb(buf: &mut RasterBuffer, red: f32, green: f32, blue: f32) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let red = CHANNEL_OFFSET.clamp(red) * 2.55;
    let green = CHANNEL_OFFSET.clamp(green) * 2.55;
    let blue = CHANNEL_OFFSET.clamp(blue) * 2.55;
    if red == 0.0 && green == 0.0 && blue == 0.0 {
        return Ok(());
    }
    apply_pixel_transform(buf, move |b, g, r| (b + blue, g + green, r + red))
}

fn apply_hsv_transform<F>(buf: &mut RasterBuffer, transform: F) -> EditorResult<()>
where
    F: Fn(u8, u8, u8) -> (u8, u8, u8) + Sync,
{
    buf.ensure_not_empty()?;
    let stride = buf.stride();
    buf.as_raw_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(CHANNELS) {
            let [h, s, v] = bgr_to_hsv(px[0], px[1], px[2]);
            let (h, s, v) = transform(h, s, v);
            px.copy_from_slice(&hsv_to_bgr(h, s, v));
        }
    });
    Ok(())
}

// ============================================================================
// HSV CONVERSION (8-bit: H 0..179 in 2° steps, S and V 0..255)
// ============================================================================

/// Number of hue steps on the half scale.
pub const HUE_STEPS: u32 = 180;

pub fn bgr_to_hsv(b: u8, g: u8, r: u8) -> [u8; 3] {
    let (bf, gf, rf) = (b as f32, g as f32, r as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;
    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };
    let h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    let h = ((h / 2.0).round() as u32 % HUE_STEPS) as u8;
    [h, saturate(s), v as u8]
}

pub fn hsv_to_bgr(h: u8, s: u8, v: u8) -> [u8; 3] {
    let s = s as f32 / 255.0;
    let v = v as f32 / 255.0;
    let c = v * s;
    let hp = (h as f32 * 2.0 % 360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let m = v - c;
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [
        saturate((b1 + m) * 255.0),
        saturate((g1 + m) * 255.0),
        saturate((r1 + m) * 255.0),
    ]
}

// ============================================================================
// FAMILY PIPELINES — fixed order, checked for cancellation between steps
// ============================================================================

/// Re-apply every non-neutral parameter of `family` onto `buf`.
///
/// Callers hand in a fresh copy of the original; this never resets by itself.
/// Returns `CancelledStale` as soon as the token is observed cancelled.
pub fn apply_family(
    buf: &mut RasterBuffer,
    params: &EffectParams,
    family: AdjustmentFamily,
    token: &CancelToken,
) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    let neutral = match family {
        AdjustmentFamily::Basic => params.basic_is_neutral(),
        AdjustmentFamily::Color => params.color_is_neutral(),
    };
    if neutral {
        return checkpoint(token);
    }
    match family {
        AdjustmentFamily::Basic => {
            if params.brightness != BRIGHTNESS.default {
                checkpoint(token)?;
                adjust_brightness(buf, params.brightness)?;
            }
            if params.contrast != CONTRAST.default {
                checkpoint(token)?;
                adjust_contrast(buf, params.contrast)?;
            }
            if (params.gamma - GAMMA.default).abs() > GAMMA_EPSILON {
                checkpoint(token)?;
                adjust_gamma(buf, params.gamma)?;
            }
        }
        AdjustmentFamily::Color => {
            if params.saturation != SATURATION.default {
                checkpoint(token)?;
                adjust_saturation(buf, params.saturation)?;
            }
            if params.hue != HUE.default {
                checkpoint(token)?;
                adjust_hue(buf, params.hue)?;
            }
            if params.red != CHANNEL_OFFSET.default
                || params.green != CHANNEL_OFFSET.default
                || params.blue != CHANNEL_OFFSET.default
            {
                checkpoint(token)?;
                adjust_rgb(buf, params.red, params.green, params.blue)?;
            }
        }
    }
    checkpoint(token)
}

#[inline]
pub(crate) fn checkpoint(token: &CancelToken) -> EditorResult<()> {
    if token.is_cancelled() {
        Err(EditorError::CancelledStale)
    } else {
        Ok(())
    }
}
