//! Image decoding with an allocation guard and RAW/HEIF front ends

use std::io::{BufRead, Cursor, Seek};
use std::ops::Range;
use std::path::Path;

use image::error::{LimitError, LimitErrorKind};
use image::io::{Limits, Reader};
use image::{DynamicImage, ImageError, ImageFormat, ImageResult};
use tracing::{debug, warn};

use crate::error::{ConvertError, ErrorContext, Result};
use crate::processing::formats::{is_heif_container, is_raw_container};
use crate::processing::preview::{scan_jpeg_streams, tiff_preview_ranges};

/// Upper bound on decoder allocations; larger images are treated as bombs
pub const DECODE_ALLOC_LIMIT: u64 = 1024 * 1024 * 1024;

/// Pixel size assumed when budgeting a decode from header dimensions
const BUDGET_BYTES_PER_PIXEL: u64 = 4;

/// Scanned streams smaller than this are marker fragments, not previews
const MIN_PREVIEW_BYTES: usize = 4 * 1024;

/// Cap on preview candidates tried per RAW file
const MAX_PREVIEW_CANDIDATES: usize = 8;

/// Decode the image at `path`.
///
/// RAW containers are rendered from their largest embedded JPEG preview when
/// one exists, HEIF containers go through libheif when built with the `heif`
/// feature; everything else uses content-sniffing decoding.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if is_raw_container(path) {
        let data = std::fs::read(path).with_file_context(path)?;
        if let Some(image) = decode_embedded_preview(&data) {
            debug!("Decoded embedded preview from {:?}", path);
            return Ok(image);
        }
        debug!("No embedded preview in {:?}, trying generic decode", path);
        return decode_generic(path).map_err(|e| match e {
            ConvertError::Decode { path, .. } => ConvertError::NoEmbeddedPreview { path },
            other => other,
        });
    }

    if is_heif_container(path) {
        return decode_heif(path);
    }

    decode_generic(path)
}

/// Reject images whose decoded pixels would exceed [`DECODE_ALLOC_LIMIT`]
pub fn check_decode_budget(width: u32, height: u32) -> ImageResult<()> {
    let bytes = u64::from(width) * u64::from(height) * BUDGET_BYTES_PER_PIXEL;
    if bytes > DECODE_ALLOC_LIMIT {
        warn!("Refusing to decode {}x{} image ({} bytes)", width, height, bytes);
        return Err(ImageError::Limits(LimitError::from_kind(
            LimitErrorKind::InsufficientMemory,
        )));
    }
    Ok(())
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(DECODE_ALLOC_LIMIT);
    limits
}

/// Read dimensions through `header`, check the budget, then decode with `reader`
fn decode_guarded<R: BufRead + Seek>(header: Reader<R>, reader: Reader<R>) -> ImageResult<DynamicImage> {
    let (width, height) = header.into_dimensions()?;
    check_decode_budget(width, height)?;
    reader.decode()
}

/// Decode by sniffing the file content, under [`DECODE_ALLOC_LIMIT`]
fn decode_generic(path: &Path) -> Result<DynamicImage> {
    let open = || {
        let mut reader = Reader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .with_file_context(path)?;
        reader.limits(decode_limits());
        Ok::<_, ConvertError>(reader)
    };

    let image = decode_guarded(open()?, open()?).map_err(|e| ConvertError::decode(path, e))?;

    debug!("Loaded image: {}x{} {:?}", image.width(), image.height(), image.color());
    Ok(image)
}

fn decode_jpeg(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let open = || {
        let mut reader = Reader::with_format(Cursor::new(bytes), ImageFormat::Jpeg);
        reader.limits(decode_limits());
        reader
    };
    decode_guarded(open(), open())
}

/// Decode the largest usable JPEG preview embedded in a RAW container.
///
/// Previews referenced from the TIFF IFD tree win; scanning the raw bytes for
/// JPEG streams is the last resort.
pub fn decode_embedded_preview(data: &[u8]) -> Option<DynamicImage> {
    decode_largest(data, tiff_preview_ranges(data)).or_else(|| {
        let scanned = scan_jpeg_streams(data)
            .into_iter()
            .filter(|range| range.len() >= MIN_PREVIEW_BYTES)
            .collect();
        decode_largest(data, scanned)
    })
}

fn decode_largest(data: &[u8], mut candidates: Vec<Range<usize>>) -> Option<DynamicImage> {
    candidates.sort_by_key(|range| (std::cmp::Reverse(range.len()), range.start));
    candidates.dedup();

    candidates
        .into_iter()
        .take(MAX_PREVIEW_CANDIDATES)
        .find_map(|range| match decode_jpeg(&data[range.clone()]) {
            Ok(image) => Some(image),
            Err(e) => {
                debug!("Preview candidate {:?} rejected: {}", range, e);
                None
            }
        })
}

#[cfg(feature = "heif")]
fn decode_heif(path: &Path) -> Result<DynamicImage> {
    use image::error::{DecodingError, ImageFormatHint};
    use image::RgbImage;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let hint = || ImageFormatHint::Name("HEIF".to_string());
    let heif_error =
        |e: libheif_rs::HeifError| ConvertError::decode(path, ImageError::Decoding(DecodingError::new(hint(), e)));
    let malformed =
        || ConvertError::decode(path, ImageError::Decoding(DecodingError::from_format_hint(hint())));

    let data = std::fs::read(path).with_file_context(path)?;
    let context = HeifContext::read_from_bytes(&data).map_err(heif_error)?;
    let handle = context.primary_image_handle().map_err(heif_error)?;
    check_decode_budget(handle.width(), handle.height()).map_err(|e| ConvertError::decode(path, e))?;

    let decoded = LibHeif::new()
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heif_error)?;
    let planes = decoded.planes();
    let plane = planes.interleaved.ok_or_else(malformed)?;

    let row_bytes = plane.width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * plane.height as usize);
    for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
        pixels.extend_from_slice(row.get(..row_bytes).ok_or_else(malformed)?);
    }

    let image = RgbImage::from_raw(plane.width, plane.height, pixels).ok_or_else(malformed)?;
    debug!("Decoded HEIF image: {}x{}", image.width(), image.height());
    Ok(DynamicImage::ImageRgb8(image))
}

#[cfg(not(feature = "heif"))]
fn decode_heif(path: &Path) -> Result<DynamicImage> {
    debug!("Built without HEIF support, sniffing {:?}", path);
    decode_generic(path)
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// PNG declaring `width`x`height` with no real pixel data behind it
    pub(crate) fn png_header_only(width: u32, height: u32) -> Vec<u8> {
        fn crc32(bytes: &[u8]) -> u32 {
            let mut crc = !0u32;
            for &byte in bytes {
                crc ^= u32::from(byte);
                for _ in 0..8 {
                    crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
                }
            }
            !crc
        }
        fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
            out.extend_from_slice(&u32::try_from(body.len()).unwrap().to_be_bytes());
            let mut tagged = kind.to_vec();
            tagged.extend_from_slice(body);
            out.extend_from_slice(&tagged);
            out.extend_from_slice(&crc32(&tagged).to_be_bytes());
        }

        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        // 8-bit RGB, deflate, adaptive filtering, no interlace
        ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        chunk(&mut png, b"IHDR", &ihdr);
        chunk(&mut png, b"IDAT", &[0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
        chunk(&mut png, b"IEND", &[]);
        png
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::png_header_only;
    use super::*;
    use crate::processing::preview::fixtures::{dng_with_previews, jpeg_bytes, with_exif_thumbnail};
    use tempfile::TempDir;

    fn fake_dng(preview: &[u8]) -> Vec<u8> {
        let mut data = b"II*\0fake raw header".to_vec();
        data.extend(std::iter::repeat(0x11).take(512));
        data.extend_from_slice(preview);
        data.extend(std::iter::repeat(0x22).take(512));
        data
    }

    #[test]
    fn test_decode_embedded_preview() {
        let data = fake_dng(&jpeg_bytes(256, 192));
        let image = decode_embedded_preview(&data).unwrap();
        assert_eq!((image.width(), image.height()), (256, 192));
    }

    #[test]
    fn test_preview_with_exif_thumbnail() {
        let preview = with_exif_thumbnail(&jpeg_bytes(256, 192), &jpeg_bytes(16, 16));
        let image = decode_embedded_preview(&fake_dng(&preview)).unwrap();
        assert_eq!((image.width(), image.height()), (256, 192));
    }

    #[test]
    fn test_largest_ifd_preview_wins() {
        let preview = with_exif_thumbnail(&jpeg_bytes(320, 240), &jpeg_bytes(16, 16));
        let data = dng_with_previews(&preview, &jpeg_bytes(32, 24));

        let image = decode_embedded_preview(&data).unwrap();
        assert_eq!((image.width(), image.height()), (320, 240));
    }

    #[test]
    fn test_no_preview() {
        assert!(decode_embedded_preview(b"no jpeg in here at all").is_none());
    }

    #[test]
    fn test_load_dng_preview() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shot.dng");
        std::fs::write(&path, dng_with_previews(&jpeg_bytes(256, 192), &jpeg_bytes(32, 24))).unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!((image.width(), image.height()), (256, 192));
    }

    #[test]
    fn test_decode_budget() {
        assert!(check_decode_budget(8000, 6000).is_ok());
        assert!(matches!(
            check_decode_budget(100_000, 100_000),
            Err(ImageError::Limits(_))
        ));
    }

    #[test]
    fn test_load_oversized_png() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bomb.png");
        std::fs::write(&path, png_header_only(100_000, 100_000)).unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Decode {
                source: ImageError::Limits(_),
                ..
            }
        ));
    }

    #[test]
    fn test_load_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }

    #[test]
    fn test_load_corrupt_dng() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.dng");
        std::fs::write(&path, b"raw sensor dump without preview").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, ConvertError::NoEmbeddedPreview { .. }));
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn test_heic_without_decoder() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("IMG_0001.HEIC");
        let mut data = b"\0\0\0\x18ftypheic\0\0\0\0mif1heic".to_vec();
        data.extend(std::iter::repeat(0).take(64));
        std::fs::write(&path, data).unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_image(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
    }
}
