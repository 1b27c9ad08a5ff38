// ============================================================================
// RASTER BUFFER — fixed-size 3-channel 8-bit pixel grid (B, G, R interleaved)
// ============================================================================

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use image::RgbImage;

use crate::error::{EditorError, EditorResult};

/// Bytes per pixel. Channel order is B, G, R.
pub const CHANNELS: usize = 3;

pub const B: usize = 0;
pub const G: usize = 1;
pub const R: usize = 2;

/// In-memory raster. Dimensions never change once created; every effect
/// mutates the pixel bytes in place.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl RasterBuffer {
    /// A black buffer of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * CHANNELS],
        }
    }

    /// Build a buffer from a per-pixel closure returning `[b, g, r]`.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        let mut buf = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                buf.set_pixel(x, y, f(x, y));
            }
        }
        buf
    }

    /// Convert from the `image` crate's RGB layout.
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let mut data = img.as_raw().clone();
        for px in data.chunks_exact_mut(CHANNELS) {
            px.swap(0, 2);
        }
        Self {
            width: img.width(),
            height: img.height(),
            data,
        }
    }

    /// Convert to the `image` crate's RGB layout (for encoding / display).
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut raw = self.data.clone();
        for px in raw.chunks_exact_mut(CHANNELS) {
            px.swap(0, 2);
        }
        RgbImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Row length in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// `[b, g, r]` at (x, y). Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.index(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, bgr: [u8; 3]) {
        let i = self.index(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&bgr);
    }

    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Replace the contents with another buffer of identical dimensions.
    pub fn copy_from(&mut self, other: &RasterBuffer) -> EditorResult<()> {
        if other.dimensions() != self.dimensions() {
            return Err(EditorError::DimensionMismatch {
                expected: self.dimensions(),
                found: other.dimensions(),
            });
        }
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Effects call this first: an empty buffer is a reported no-op.
    pub(crate) fn ensure_not_empty(&self) -> EditorResult<()> {
        if self.is_empty() || self.data.is_empty() {
            Err(EditorError::EmptyBuffer)
        } else {
            Ok(())
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

// ============================================================================
// SNAPSHOT — immutable, shareable rendering of a buffer
// ============================================================================

/// Frozen copy of a buffer. Cloning is cheap; the pixels are never mutated.
#[derive(Clone)]
pub struct Snapshot(Arc<RasterBuffer>);

impl Snapshot {
    pub fn new(buffer: RasterBuffer) -> Self {
        Self(Arc::new(buffer))
    }

    pub fn buffer(&self) -> &RasterBuffer {
        &self.0
    }

    /// True when both snapshots share the same allocation.
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Snapshot {
    type Target = RasterBuffer;

    fn deref(&self) -> &RasterBuffer {
        &self.0
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Snapshot").field(&*self.0).finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::RasterBuffer;

    /// Deterministic, colourful test pattern.
    pub fn pattern(width: u32, height: u32) -> RasterBuffer {
        RasterBuffer::from_fn(width, height, |x, y| {
            [
                ((x * 37 + y * 11) % 256) as u8,
                ((x * 13 + y * 29 + 64) % 256) as u8,
                ((x * 7 + y * 53 + 128) % 256) as u8,
            ]
        })
    }

    pub fn solid(width: u32, height: u32, bgr: [u8; 3]) -> RasterBuffer {
        RasterBuffer::from_fn(width, height, |_, _| bgr)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::pattern;
    use super::*;

    #[test]
    fn rgb_conversion_swaps_channel_order() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([10, 20, 30]));
        let buf = RasterBuffer::from_rgb_image(&img);
        assert_eq!(buf.pixel(0, 0), [30, 20, 10]);
        assert_eq!(buf.to_rgb_image().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn copy_from_requires_same_dimensions() {
        let mut a = pattern(4, 4);
        let b = pattern(4, 3);
        assert!(matches!(
            a.copy_from(&b),
            Err(EditorError::DimensionMismatch { .. })
        ));
        let c = RasterBuffer::new(4, 4);
        a.copy_from(&c).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn empty_buffer_is_reported() {
        assert!(matches!(
            RasterBuffer::new(0, 5).ensure_not_empty(),
            Err(EditorError::EmptyBuffer)
        ));
        assert!(pattern(1, 1).ensure_not_empty().is_ok());
    }

    #[test]
    fn snapshot_equality_is_by_content() {
        let a = Snapshot::new(pattern(3, 3));
        let b = Snapshot::new(pattern(3, 3));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert!(a.ptr_eq(&a.clone()));
    }
}
