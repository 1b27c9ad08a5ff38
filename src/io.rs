use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageError};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::{EditorError, EditorResult};
use crate::raster::RasterBuffer;

/// Default JPEG quality when none is given.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

// ============================================================================
// DECODING
// ============================================================================

/// Decode an image file (JPEG, PNG, BMP, GIF, TIFF) into a B,G,R buffer.
/// Alpha is discarded; animated formats contribute their first frame.
pub fn load_image(path: &Path) -> EditorResult<RasterBuffer> {
    let img = image::open(path).map_err(|e| EditorError::load_failed(format!("{}: {}", path.display(), e)))?;
    let buf = RasterBuffer::from_rgb_image(&img.to_rgb8());
    reject_empty(buf)
}

/// Decode an in-memory byte stream, sniffing the format from its header.
pub fn load_image_from_memory(bytes: &[u8]) -> EditorResult<RasterBuffer> {
    let img = image::load_from_memory(bytes).map_err(|e| EditorError::load_failed(e.to_string()))?;
    reject_empty(RasterBuffer::from_rgb_image(&img.to_rgb8()))
}

fn reject_empty(buf: RasterBuffer) -> EditorResult<RasterBuffer> {
    if buf.is_empty() {
        return Err(EditorError::load_failed("image has no pixels"));
    }
    Ok(buf)
}

// ============================================================================
// ENCODING
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
        }
    }

    /// Parse a format name or extension (`png`, `jpg`, `jpeg`, `bmp`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            _ => None,
        }
    }

    /// Infer from the path's extension; unknown or missing extensions save as PNG.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_name)
            .unwrap_or_default()
    }
}

/// Encode a buffer and write it to `path`.
/// `quality` is only used for JPEG and is clamped to 1..=100.
pub fn encode_and_write(
    buf: &RasterBuffer,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> EditorResult<()> {
    buf.ensure_not_empty()?;
    write_encoded(buf, path, format, quality.clamp(1, 100))
        .map_err(|e| EditorError::save_failed(format!("{}: {}", path.display(), e)))
}

fn write_encoded(
    buf: &RasterBuffer,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    let rgb = buf.to_rgb_image();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }
        SaveFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }
    }
    Ok(())
}
