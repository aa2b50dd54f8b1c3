//! Input format whitelist and JPEG output encoding

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::error::{ConvertError, ErrorContext, Result};

/// Extensions accepted by discovery (compared case-insensitively)
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "heic", "dng", "bmp", "tiff", "gif"];

/// Extension of every produced file
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Fixed encoder quality; the visible size knob is the resize percentage
pub const JPEG_QUALITY: u8 = 100;

/// Check if a file extension is supported for input
pub fn is_supported_input_format(extension: &str) -> bool {
    SUPPORTED_INPUT_EXTENSIONS
        .iter()
        .any(|&fmt| fmt.eq_ignore_ascii_case(extension))
}

/// Check if a path carries a supported input extension
pub fn is_supported_input_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, is_supported_input_format)
}

/// RAW containers that usually embed a full-size JPEG preview
pub fn is_raw_container(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("dng"))
}

/// HEIF containers (iPhone photos), decoded through libheif when enabled
pub fn is_heif_container(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("heic"))
}

/// Encode `image` as a baseline JPEG at [`JPEG_QUALITY`], replacing any
/// existing file at `output_path`.
pub fn write_jpeg(image: &DynamicImage, output_path: &Path) -> Result<u64> {
    let file = File::create(output_path).with_file_context(output_path)?;
    let mut writer = BufWriter::new(file);

    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    let written = image
        .write_with_encoder(encoder)
        .map_err(|e| ConvertError::encode(output_path, e))
        .and_then(|()| writer.flush().with_file_context(output_path));

    if let Err(e) = written {
        // A half-written file must not count as output
        drop(writer);
        let _ = std::fs::remove_file(output_path);
        return Err(e);
    }

    let metadata = std::fs::metadata(output_path).with_file_context(output_path)?;
    Ok(metadata.len())
}
