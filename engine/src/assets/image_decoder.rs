// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    R,
    Rg,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    pub fn channels(self) -> usize {
        match self {
            ChannelLayout::R => 1,
            ChannelLayout::Rg => 2,
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }

    /// (internal format, pixel format) pair for an 8-bit-per-channel upload.
    pub fn gl_formats(self) -> (i32, u32) {
        match self {
            ChannelLayout::R => (glow::R8 as i32, glow::RED),
            ChannelLayout::Rg => (glow::RG8 as i32, glow::RG),
            ChannelLayout::Rgb => (glow::RGB8 as i32, glow::RGB),
            ChannelLayout::Rgba => (glow::RGBA8 as i32, glow::RGBA),
        }
    }
}

/// CPU-side pixels ready for upload: row-major, 8 bits per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub label: String,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub layout: ChannelLayout,
}

impl DecodedImage {
    pub fn new(
        label: impl Into<String>,
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        layout: ChannelLayout,
    ) -> Self {
        Self {
            label: label.into(),
            pixels,
            width,
            height,
            layout,
        }
    }

    /// Solid single-colour RGBA image, mostly useful for tests and fallbacks.
    pub fn solid_rgba(label: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(label, pixels, width, height, ChannelLayout::Rgba)
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.channels()
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::InvalidImage {
                label: self.label.clone(),
                reason: format!("dimensions must be non-zero, got {}x{}", self.width, self.height),
            });
        }
        if self.pixels.len() != self.expected_len() {
            return Err(EngineError::InvalidImage {
                label: self.label.clone(),
                reason: format!(
                    "expected {} bytes for {}x{} {:?}, got {}",
                    self.expected_len(),
                    self.width,
                    self.height,
                    self.layout,
                    self.pixels.len()
                ),
            });
        }
        Ok(())
    }
}

pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> EngineResult<DecodedImage>;
}

/// Decodes image files with the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateDecoder {
    /// GL samples row 0 at the bottom; image files store it at the top.
    pub flip_vertically: bool,
}

impl Default for ImageCrateDecoder {
    fn default() -> Self {
        Self {
            flip_vertically: true,
        }
    }
}

impl ImageCrateDecoder {
    pub fn new(flip_vertically: bool) -> Self {
        Self { flip_vertically }
    }

    fn convert(&self, label: String, img: DynamicImage) -> DecodedImage {
        let img = if self.flip_vertically { img.flipv() } else { img };
        let (width, height) = img.dimensions();

        // 8-bit RGB/RGBA keep their layout; everything else is widened to RGBA8.
        match img {
            DynamicImage::ImageRgb8(rgb) => {
                DecodedImage::new(label, rgb.into_raw(), width, height, ChannelLayout::Rgb)
            }
            DynamicImage::ImageRgba8(rgba) => {
                DecodedImage::new(label, rgba.into_raw(), width, height, ChannelLayout::Rgba)
            }
            other => DecodedImage::new(
                label,
                other.to_rgba8().into_raw(),
                width,
                height,
                ChannelLayout::Rgba,
            ),
        }
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> EngineResult<DecodedImage> {
        let img = image::open(path).map_err(|source| EngineError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = self.convert(path.display().to_string(), img);
        log::debug!(
            "Decoded {} ({}x{}, {:?})",
            decoded.label,
            decoded.width,
            decoded.height,
            decoded.layout
        );
        Ok(decoded)
    }
}
