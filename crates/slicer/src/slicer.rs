//! Per-run slicing state

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, ImageResult, RgbaImage};
use serde::Serialize;
use tallcrop_config::SliceConfig;
use tracing::{debug, info};

use crate::error::SlicerError;
use crate::geometry::SliceGeometry;
use crate::naming::slice_file_name;
use crate::surface::ScratchSurface;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// A selected image file: its name and undecoded bytes
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// An encoded slice that passed the size gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SliceFile {
    #[inline]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A slice dropped for being over the size limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSlice {
    pub source_name: String,
    /// One-based slice number
    pub number: u32,
    pub size_bytes: u64,
}

impl SkippedSlice {
    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MIB
    }
}

/// Everything one run produced, in output order
#[derive(Debug, Clone, Default)]
pub struct SliceBatch {
    /// Kept slices: sources in input order, slices top to bottom
    pub files: Vec<SliceFile>,
    pub skipped: Vec<SkippedSlice>,
}

impl SliceBatch {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(SliceFile::size).sum()
    }
}

/// Slices sources one after another into a single [`SliceBatch`].
///
/// A `Slicer` lives for one selection. Sources must be added in the order the
/// user picked them; each one is finished before the call returns, so output
/// names and order only depend on the input order.
pub struct Slicer {
    config: SliceConfig,
    scratch: ScratchSurface,
    batch: SliceBatch,
    sources_seen: usize,
}

impl Slicer {
    pub fn new(config: SliceConfig) -> Self {
        Self {
            config,
            scratch: ScratchSurface::new(),
            batch: SliceBatch::default(),
            sources_seen: 0,
        }
    }

    pub fn config(&self) -> &SliceConfig {
        &self.config
    }

    /// Number of sources added so far
    pub fn sources_seen(&self) -> usize {
        self.sources_seen
    }

    /// Decode, rescale, slice and gate one source.
    ///
    /// Returns the number of slices kept from this source. A decode or encode
    /// failure aborts the source; slices it already produced stay in the batch
    /// but the caller is expected to abandon the run.
    pub fn add_source(&mut self, source: &SourceImage) -> Result<usize, SlicerError> {
        self.sources_seen += 1;

        let decoded = decode_oriented(&source.bytes)
            .map_err(|err| SlicerError::Decode {
                name: source.name.clone(),
                source: err,
            })?
            .into_rgba8();

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(SlicerError::EmptyImage {
                name: source.name.clone(),
                width,
                height,
            });
        }

        let geometry = SliceGeometry::for_source(width, height, &self.config);
        debug!(
            "{}: {}x{} -> {}x{}, {} slice(s)",
            source.name,
            width,
            height,
            geometry.width,
            geometry.height,
            geometry.slice_count()
        );
        if geometry.height == 0 {
            return Ok(0);
        }
        if geometry
            .surface_bytes()
            .is_none_or(|bytes| bytes > self.config.max_surface_bytes)
        {
            return Err(SlicerError::TooLarge {
                name: source.name.clone(),
                width: geometry.width,
                height: geometry.height,
            });
        }

        let rescaled = rescale(decoded, &geometry);

        let mut kept = 0;
        for band in geometry.bands() {
            self.scratch.load_band(&rescaled, band);
            let bytes = self
                .scratch
                .encode_png()
                .map_err(|err| SlicerError::Encode {
                    name: source.name.clone(),
                    number: band.number(),
                    source: err,
                })?;

            let size = bytes.len() as u64;
            if self.config.fits(size) {
                self.batch.files.push(SliceFile {
                    name: slice_file_name(&source.name, band.number()),
                    bytes,
                });
                kept += 1;
            } else {
                let skipped = SkippedSlice {
                    source_name: source.name.clone(),
                    number: band.number(),
                    size_bytes: size,
                };
                info!(
                    "Skipped slice {} of {}: {:.2} MiB exceeds the {:.2} MiB limit",
                    skipped.number,
                    skipped.source_name,
                    skipped.size_mib(),
                    self.config.max_slice_bytes as f64 / BYTES_PER_MIB
                );
                self.batch.skipped.push(skipped);
            }
        }

        Ok(kept)
    }

    /// End the run and hand back everything it produced
    pub fn finish(self) -> SliceBatch {
        if self.sources_seen > 0 && self.batch.is_empty() {
            info!("No slices under the size limit; nothing to upload");
        }
        self.batch
    }
}

/// Slice every source in order with a fresh [`Slicer`]
pub fn slice_sources<'a, I>(config: SliceConfig, sources: I) -> Result<SliceBatch, SlicerError>
where
    I: IntoIterator<Item = &'a SourceImage>,
{
    let mut slicer = Slicer::new(config);
    for source in sources {
        slicer.add_source(source)?;
    }
    Ok(slicer.finish())
}

/// Decode `bytes` and turn the pixels upright, as a browser displays them.
///
/// JPEG and other formats carrying an EXIF orientation tag are rotated or
/// flipped before any size is read from them.
fn decode_oriented(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ImageError::IoError)?
        .into_decoder()?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Scale `image` to the geometry's width and height in a single resampling pass
fn rescale(image: RgbaImage, geometry: &SliceGeometry) -> RgbaImage {
    if image.dimensions() == (geometry.width, geometry.height) {
        return image;
    }
    imageops::resize(&image, geometry.width, geometry.height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn solid_png(name: &str, width: u32, height: u32) -> SourceImage {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 120, 40, 255]));
        SourceImage::new(name, encode(&image, ImageFormat::Png))
    }

    /// Pixels from a xorshift generator, which PNG cannot compress
    fn noise_rows(image: &mut RgbaImage, rows: std::ops::Range<u32>) {
        let mut state: u32 = 0x9E37_79B9;
        let width = image.width();
        for y in rows {
            for x in 0..width {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let [r, g, b, _] = state.to_le_bytes();
                image.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }
    }

    fn decode(file: &SliceFile) -> RgbaImage {
        image::load_from_memory(&file.bytes).unwrap().into_rgba8()
    }

    #[test]
    fn test_tall_image_produces_two_slices() {
        let batch = slice_sources(SliceConfig::default(), [&solid_png("x.png", 1600, 3000)]).unwrap();

        let names: Vec<_> = batch.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x_slice_1.png", "x_slice_2.png"]);
        assert_eq!(decode(&batch.files[0]).dimensions(), (800, 1000));
        assert_eq!(decode(&batch.files[1]).dimensions(), (800, 500));
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn test_square_at_target_width_is_one_slice() {
        let batch = slice_sources(SliceConfig::default(), [&solid_png("x.png", 800, 800)]).unwrap();
        assert_eq!(batch.files.len(), 1);
        assert_eq!(decode(&batch.files[0]).dimensions(), (800, 800));
    }

    #[test]
    fn test_pixels_survive_unscaled_slicing() {
        let mut image = RgbaImage::from_pixel(800, 1200, Rgba([0, 0, 255, 255]));
        for y in 1000..1200 {
            for x in 0..800 {
                image.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        let source = SourceImage::new("flag.png", encode(&image, ImageFormat::Png));
        let batch = slice_sources(SliceConfig::default(), [&source]).unwrap();

        assert_eq!(decode(&batch.files[0]).get_pixel(400, 999), &Rgba([0, 0, 255, 255]));
        assert_eq!(decode(&batch.files[1]).get_pixel(400, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_output_keeps_input_order() {
        let sources = [
            solid_png("b.jpg", 800, 1500),
            solid_png("a.png", 400, 300),
        ];
        let batch = slice_sources(SliceConfig::default(), &sources).unwrap();

        let names: Vec<_> = batch.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b_slice_1.png", "b_slice_2.png", "a_slice_1.png"]);
        assert_eq!(decode(&batch.files[2]).dimensions(), (800, 600));
    }

    #[test]
    fn test_jpeg_sources_are_accepted() {
        let image = RgbaImage::from_pixel(1000, 500, Rgba([10, 20, 30, 255]));
        let rgb = image::DynamicImage::ImageRgba8(image).into_rgb8();
        let mut out = Cursor::new(Vec::new());
        rgb.write_to(&mut out, ImageFormat::Jpeg).unwrap();

        let source = SourceImage::new("photo.jpeg", out.into_inner());
        let batch = slice_sources(SliceConfig::default(), [&source]).unwrap();
        assert_eq!(batch.files.len(), 1);
        assert_eq!(decode(&batch.files[0]).dimensions(), (800, 400));
    }

    /// JPEG with an EXIF APP1 segment carrying only an orientation tag
    fn jpeg_with_orientation(image: &RgbaImage, orientation: u8) -> Vec<u8> {
        let rgb = image::DynamicImage::ImageRgba8(image.clone()).into_rgb8();
        let mut out = Cursor::new(Vec::new());
        rgb.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        let jpeg = out.into_inner();

        #[rustfmt::skip]
        let app1: [u8; 36] = [
            0xFF, 0xE1, 0x00, 0x22,
            b'E', b'x', b'i', b'f', 0, 0,
            // Big-endian TIFF header, first IFD at offset 8
            b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08,
            // One entry: Orientation (0x0112), SHORT, count 1
            0x00, 0x01,
            0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, orientation, 0x00, 0x00,
            // No next IFD
            0x00, 0x00, 0x00, 0x00,
        ];

        let mut tagged = jpeg[..2].to_vec();
        tagged.extend_from_slice(&app1);
        tagged.extend_from_slice(&jpeg[2..]);
        tagged
    }

    #[test]
    fn test_exif_rotated_jpeg_is_sliced_upright() {
        // Stored landscape, left half red and right half blue; orientation 6
        // means the viewer rotates it 90 degrees clockwise into portrait
        let stored = RgbaImage::from_fn(1600, 800, |x, _| {
            if x < 800 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let source = SourceImage::new("phone.jpg", jpeg_with_orientation(&stored, 6));

        let batch = slice_sources(SliceConfig::default(), [&source]).unwrap();

        let slices: Vec<_> = batch.files.iter().map(|f| decode(f).dimensions()).collect();
        assert_eq!(slices, vec![(800, 1000), (800, 600)]);

        // The stored left edge is now the top
        let top = *decode(&batch.files[0]).get_pixel(400, 500);
        assert!(top[0] > 200 && top[2] < 60, "top slice should be red: {top:?}");
        let bottom = *decode(&batch.files[1]).get_pixel(400, 300);
        assert!(bottom[2] > 200 && bottom[0] < 60, "bottom slice should be blue: {bottom:?}");
    }

    #[test]
    fn test_upright_exif_jpeg_is_unchanged() {
        let stored = RgbaImage::from_pixel(1600, 800, Rgba([0, 128, 0, 255]));
        let source = SourceImage::new("flat.jpg", jpeg_with_orientation(&stored, 1));

        let batch = slice_sources(SliceConfig::default(), [&source]).unwrap();
        assert_eq!(batch.files.len(), 1);
        assert_eq!(decode(&batch.files[0]).dimensions(), (800, 400));
    }

    #[test]
    fn test_tiff_and_ico_sources_are_accepted() {
        let image = RgbaImage::from_pixel(200, 100, Rgba([1, 2, 3, 255]));
        let sources = [
            SourceImage::new("scan.tiff", encode(&image, ImageFormat::Tiff)),
            SourceImage::new("icon.ico", encode(&image, ImageFormat::Ico)),
        ];

        let batch = slice_sources(SliceConfig::default(), &sources).unwrap();
        let names: Vec<_> = batch.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["scan_slice_1.png", "icon_slice_1.png"]);
        assert_eq!(decode(&batch.files[0]).dimensions(), (800, 400));
    }

    #[test]
    fn test_runaway_upscale_is_rejected() {
        // 50 px wide upscales 16x: 800 x 1_600_000 would need about 5 GB
        let source = solid_png("strip.png", 50, 100_000);
        let err = slice_sources(SliceConfig::default(), [&source]).unwrap_err();
        match err {
            SlicerError::TooLarge { name, width, height } => {
                assert_eq!(name, "strip.png");
                assert_eq!((width, height), (800, 1_600_000));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_surface_limit_is_inclusive() {
        let source = solid_png("x.png", 800, 1500);
        let exact = SliceConfig {
            max_surface_bytes: 800 * 1500 * 4,
            ..SliceConfig::default()
        };
        assert_eq!(slice_sources(exact, [&source]).unwrap().files.len(), 2);

        let below = SliceConfig {
            max_surface_bytes: 800 * 1500 * 4 - 1,
            ..SliceConfig::default()
        };
        assert!(matches!(
            slice_sources(below, [&source]),
            Err(SlicerError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_oversized_slice_is_skipped() {
        let mut image = RgbaImage::from_pixel(800, 1200, Rgba([255, 255, 255, 255]));
        noise_rows(&mut image, 0..1000);
        let source = SourceImage::new("noisy.png", encode(&image, ImageFormat::Png));

        let batch = slice_sources(SliceConfig::default(), [&source]).unwrap();

        assert_eq!(batch.files.len(), 1);
        assert_eq!(batch.files[0].name, "noisy_slice_2.png");
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].number, 1);
        assert_eq!(batch.skipped[0].source_name, "noisy.png");
        assert!(batch.skipped[0].size_bytes > 1_468_006);
        assert!(batch.skipped[0].size_mib() > 1.4);
    }

    #[test]
    fn test_size_gate_boundary_is_inclusive() {
        let source = solid_png("x.png", 800, 800);
        let exact = slice_sources(SliceConfig::default(), [&source]).unwrap().files[0].size();

        let at_limit = SliceConfig {
            max_slice_bytes: exact,
            ..SliceConfig::default()
        };
        assert_eq!(slice_sources(at_limit, [&source]).unwrap().files.len(), 1);

        let below = SliceConfig {
            max_slice_bytes: exact - 1,
            ..SliceConfig::default()
        };
        let batch = slice_sources(below, [&source]).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.skipped[0].size_bytes, exact);
    }

    #[test]
    fn test_all_slices_oversized_gives_empty_batch() {
        let tiny = SliceConfig {
            max_slice_bytes: 10,
            ..SliceConfig::default()
        };
        let sources = [solid_png("a.png", 800, 2000), solid_png("b.png", 1600, 800)];
        let batch = slice_sources(tiny, &sources).unwrap();

        assert!(batch.is_empty());
        assert_eq!(batch.skipped.len(), 3);
        assert_eq!(batch.total_bytes(), 0);
    }

    #[test]
    fn test_no_sources_gives_empty_batch() {
        let slicer = Slicer::new(SliceConfig::default());
        assert_eq!(slicer.sources_seen(), 0);
        let batch = slicer.finish();
        assert!(batch.is_empty());
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn test_undecodable_source_aborts() {
        let sources = [
            solid_png("ok.png", 800, 100),
            SourceImage::new("broken.png", b"definitely not an image".to_vec()),
            solid_png("never.png", 800, 100),
        ];
        let err = slice_sources(SliceConfig::default(), &sources).unwrap_err();
        match err {
            SlicerError::Decode { name, .. } => assert_eq!(name, "broken.png"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_very_wide_source_yields_nothing() {
        let mut slicer = Slicer::new(SliceConfig::default());
        let kept = slicer.add_source(&solid_png("strip.png", 4000, 4)).unwrap();
        assert_eq!(kept, 0);
        assert_eq!(slicer.sources_seen(), 1);
        assert!(slicer.finish().is_empty());
    }
}
