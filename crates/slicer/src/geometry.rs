//! Rescale and slice arithmetic
//!
//! All sizes are in pixels. The rescaled height is computed in `f64` the same
//! way a canvas draw would see it, then floored.

use tallcrop_config::SliceConfig;

/// Height of an image of `width` x `height` once rescaled to `target_width`.
///
/// Returns 0 for a zero-width source.
pub fn rescaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let scale = f64::from(target_width) / f64::from(width);
    (f64::from(height) * scale).floor() as u32
}

/// Number of bands needed to cover `height` with bands of `slice_height`
#[inline]
pub fn slice_count(height: u32, slice_height: u32) -> u32 {
    if slice_height == 0 {
        return 0;
    }
    height.div_ceil(slice_height)
}

/// One horizontal band of the rescaled surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceBand {
    /// Zero-based position of the band, top first
    pub index: u32,
    /// First row of the band in the rescaled surface
    pub top: u32,
    /// Number of rows in the band
    pub height: u32,
}

impl SliceBand {
    /// One-based number used in output file names
    #[inline]
    pub fn number(&self) -> u32 {
        self.index + 1
    }

    /// Row just past the end of the band
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// Rescaled dimensions of one source and the bands covering it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceGeometry {
    pub width: u32,
    pub height: u32,
    pub slice_height: u32,
}

impl SliceGeometry {
    /// Geometry for a source of `width` x `height` under `config`
    pub fn for_source(width: u32, height: u32, config: &SliceConfig) -> Self {
        Self {
            width: config.target_width,
            height: rescaled_height(width, height, config.target_width),
            slice_height: config.slice_height,
        }
    }

    /// Number of bands
    #[inline]
    pub fn slice_count(&self) -> u32 {
        slice_count(self.height, self.slice_height)
    }

    /// Bytes of an RGBA8 surface of this size, `None` on overflow
    pub fn surface_bytes(&self) -> Option<u64> {
        u64::from(self.width)
            .checked_mul(u64::from(self.height))?
            .checked_mul(4)
    }

    /// Bands from top to bottom; they cover `0..height` with no gap or overlap
    pub fn bands(&self) -> impl Iterator<Item = SliceBand> + use<> {
        let height = self.height;
        let slice_height = self.slice_height;
        (0..self.slice_count()).map(move |index| {
            let top = index * slice_height;
            SliceBand {
                index,
                top,
                height: slice_height.min(height - top),
            }
        })
    }
}
