//! Scratch surface shared by every slice of a run

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageResult, RgbaImage};

use crate::geometry::SliceBand;

const BYTES_PER_PIXEL: usize = 4;

/// An RGBA8 pixel buffer that holds one slice at a time.
///
/// Loading a band replaces the whole buffer, so nothing from a previous slice
/// survives into the next one. The allocation is kept between slices.
#[derive(Debug, Default)]
pub struct ScratchSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ScratchSurface {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixels of the current slice, row-major
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy the rows of `band` out of `source` into the surface
    pub fn load_band(&mut self, source: &RgbaImage, band: SliceBand) {
        let row_bytes = source.width() as usize * BYTES_PER_PIXEL;
        let start = band.top as usize * row_bytes;
        let end = band.bottom() as usize * row_bytes;

        self.width = source.width();
        self.height = band.height;
        self.pixels.clear();
        self.pixels.extend_from_slice(&source.as_raw()[start..end]);
    }

    /// Encode the current slice as PNG with the encoder's default settings
    pub fn encode_png(&self) -> ImageResult<Vec<u8>> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out).write_image(
            &self.pixels,
            self.width,
            self.height,
            ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }
}
