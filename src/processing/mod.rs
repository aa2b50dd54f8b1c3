//! Per-file transform: decode, normalize, downscale, encode

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::config::QualityDecrease;
use crate::error::Result;

pub mod color;
pub mod decode;
pub mod formats;
pub mod preview;
pub mod resize;

pub use color::{normalize, ColorMode, Normalization};
pub use decode::load_image;
pub use formats::{is_supported_input_format, is_supported_input_path, write_jpeg};
pub use resize::{downscale, target_dimensions};

/// One unit of conversion work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub quality_decrease: Option<QualityDecrease>,
    /// 1-based discovery index; only used to keep output names unique
    pub ordinal: usize,
}

impl WorkItem {
    /// Create a new work item
    pub fn new(
        source_path: PathBuf,
        output_dir: PathBuf,
        quality_decrease: Option<QualityDecrease>,
        ordinal: usize,
    ) -> Self {
        Self {
            source_path,
            output_dir,
            quality_decrease,
            ordinal,
        }
    }

    /// `{ordinal}_{stem}.jpg` inside the output directory
    pub fn output_path(&self) -> PathBuf {
        let stem = self
            .source_path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();

        self.output_dir.join(format!(
            "{}_{}.{}",
            self.ordinal,
            stem,
            formats::OUTPUT_EXTENSION
        ))
    }
}

/// A successfully written output file
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub processing_time: Duration,
}

/// Result of attempting one work item
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Converted(ConvertedImage),
    Failed { source_path: PathBuf, reason: String },
}

impl ItemOutcome {
    /// Whether an output file was produced
    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Converted(_))
    }

    /// Source file this outcome belongs to
    pub fn source_path(&self) -> &Path {
        match self {
            Self::Converted(converted) => &converted.source_path,
            Self::Failed { source_path, .. } => source_path,
        }
    }
}

/// Convert a single work item.
///
/// Never fails: decode and encode errors are logged and reported as
/// [`ItemOutcome::Failed`] so sibling items keep going.
pub fn process_item(item: &WorkItem) -> ItemOutcome {
    match convert(item) {
        Ok(converted) => ItemOutcome::Converted(converted),
        Err(e) => {
            let path = e.file_path().unwrap_or(&item.source_path);
            error!("Error processing {}: {}", path.display(), e);
            ItemOutcome::Failed {
                source_path: item.source_path.clone(),
                reason: e.to_string(),
            }
        }
    }
}

fn convert(item: &WorkItem) -> Result<ConvertedImage> {
    let start_time = Instant::now();
    let output_path = item.output_path();

    debug!("Processing file: {:?} -> {:?}", item.source_path, output_path);

    let image = load_image(&item.source_path)?;
    let image = normalize(image);
    let image = downscale(image, item.quality_decrease);
    let file_size = write_jpeg(&image, &output_path)?;

    let processing_time = start_time.elapsed();
    debug!(
        "Saved {:?}: {}x{} ({:.2}MB) in {:.2}s",
        output_path,
        image.width(),
        image.height(),
        file_size as f64 / 1024.0 / 1024.0,
        processing_time.as_secs_f64()
    );

    Ok(ConvertedImage {
        source_path: item.source_path.clone(),
        output_path,
        width: image.width(),
        height: image.height(),
        file_size,
        processing_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage, Rgb, RgbImage};
    use tempfile::TempDir;

    fn decrease(percent: i64) -> Option<QualityDecrease> {
        QualityDecrease::from_raw(Some(percent)).unwrap()
    }

    #[test]
    fn test_output_path() {
        let item = WorkItem::new(
            PathBuf::from("/photos/trip/IMG_0042.HEIC"),
            PathBuf::from("/photos/_converted"),
            None,
            7,
        );
        assert_eq!(item.output_path(), PathBuf::from("/photos/_converted/7_IMG_0042.jpg"));
    }

    #[test]
    fn test_output_path_same_stem() {
        let output_dir = PathBuf::from("/out");
        let a = WorkItem::new(PathBuf::from("/in/a/cat.png"), output_dir.clone(), None, 1);
        let b = WorkItem::new(PathBuf::from("/in/b/cat.png"), output_dir, None, 2);
        assert_ne!(a.output_path(), b.output_path());
    }

    #[test]
    fn test_process_png_with_alpha() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("logo.png");
        RgbaImage::from_pixel(400, 200, Rgba([255, 0, 0, 128]))
            .save(&source)
            .unwrap();

        let item = WorkItem::new(source, temp_dir.path().to_path_buf(), decrease(50), 1);
        let outcome = process_item(&item);

        let ItemOutcome::Converted(converted) = outcome else {
            panic!("expected conversion, got {outcome:?}");
        };
        assert_eq!((converted.width, converted.height), (200, 100));
        assert_eq!(converted.output_path, temp_dir.path().join("1_logo.jpg"));

        let reader = image::io::Reader::open(&converted.output_path)
            .unwrap()
            .with_guessed_format()
            .unwrap();
        assert_eq!(reader.format(), Some(ImageFormat::Jpeg));
        assert_eq!(image::image_dimensions(&converted.output_path).unwrap(), (200, 100));
    }

    #[test]
    fn test_process_without_resize() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("plain.bmp");
        RgbImage::from_pixel(50, 40, Rgb([0, 128, 0])).save(&source).unwrap();

        let item = WorkItem::new(source, temp_dir.path().to_path_buf(), None, 3);
        assert!(process_item(&item).is_converted());
        assert_eq!(
            image::image_dimensions(temp_dir.path().join("3_plain.jpg")).unwrap(),
            (50, 40)
        );
    }

    #[test]
    fn test_process_corrupt_file_fails_softly() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("broken.jpg");
        std::fs::write(&source, b"not really a jpeg").unwrap();

        let item = WorkItem::new(source.clone(), temp_dir.path().to_path_buf(), None, 1);
        let outcome = process_item(&item);

        assert!(!outcome.is_converted());
        assert_eq!(outcome.source_path(), source.as_path());
        assert!(!temp_dir.path().join("1_broken.jpg").exists());
    }

    #[test]
    fn test_process_oversized_image_fails_softly() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("huge.png");
        std::fs::write(&source, decode::fixtures::png_header_only(100_000, 100_000)).unwrap();

        let item = WorkItem::new(source, temp_dir.path().to_path_buf(), decrease(50), 4);
        let outcome = process_item(&item);

        let ItemOutcome::Failed { reason, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(reason.starts_with("cannot decode image"), "{reason}");
        assert!(!temp_dir.path().join("4_huge.jpg").exists());
    }
}
