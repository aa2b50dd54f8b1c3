//! Discovery, fan-out and orchestration of a conversion run

use std::path::PathBuf;
use std::time::{Duration, Instant};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::error::{Result, ConvertError};
use crate::processing::process_item;

pub mod discovery;
pub mod progress;
pub mod scheduler;

pub use discovery::{discover_images, plan_work};
pub use progress::{ConversionProgress, ProgressTally};
pub use scheduler::WorkerPool;

/// Drives one conversion run from discovery to the final summary
pub struct BatchConverter {
    config: ConvertConfig,
}

impl BatchConverter {
    /// Create a new converter
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }

    /// Convert every supported image under the input directory.
    ///
    /// Fails only on fatal errors (bad input directory, out-of-range quality,
    /// output directory or pool creation). Per-file failures are logged and
    /// counted in the summary.
    pub fn run(&self) -> Result<ConversionSummary> {
        let start_time = Instant::now();
        let quality_decrease = self.config.resolved_quality()?;

        let files = discover_images(&self.config.input_dir)?;

        if files.is_empty() {
            warn!("No valid image files found in the directory.");
            return Ok(ConversionSummary::empty(start_time.elapsed()));
        }

        let total_images = files.len();
        info!("Found {} images to process.", total_images);

        let output_dir = self.config.output_dir();
        std::fs::create_dir_all(&output_dir).map_err(|source| ConvertError::OutputDirectory {
            path: output_dir.clone(),
            source,
        })?;

        let items = plan_work(files, &output_dir, quality_decrease);
        let pool = WorkerPool::new(self.config.workers, self.config.chunk_size)?;

        info!("Processing images ...");
        debug!(
            "{} work items on {} workers, {} per chunk",
            items.len(),
            pool.workers(),
            pool.chunk_size()
        );
        let mut progress = ConversionProgress::new(total_images as u64, self.config.show_progress);
        pool.for_each_chunked(&items, process_item, |outcome| progress.record(&outcome));
        let tally = progress.finish();

        let elapsed = start_time.elapsed();
        info!(
            "Done in {:.2} seconds. Images saved to '{}'.",
            elapsed.as_secs_f64(),
            output_dir.display()
        );
        if tally.failed > 0 {
            warn!("{} of {} images could not be converted", tally.failed, tally.total);
        }

        Ok(ConversionSummary::from_tally(tally, elapsed, output_dir))
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
    /// `None` when nothing qualified and no directory was created
    pub output_dir: Option<PathBuf>,
}

impl ConversionSummary {
    fn empty(elapsed: Duration) -> Self {
        Self {
            total: 0,
            converted: 0,
            failed: 0,
            elapsed_secs: elapsed.as_secs_f64(),
            output_dir: None,
        }
    }

    fn from_tally(tally: ProgressTally, elapsed: Duration, output_dir: PathBuf) -> Self {
        Self {
            total: tally.total,
            converted: tally.converted,
            failed: tally.failed,
            elapsed_secs: elapsed.as_secs_f64(),
            output_dir: Some(output_dir),
        }
    }

    /// Converted files per second of wall-clock time
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.converted as f64 / self.elapsed_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_summary_rates() {
        let summary = ConversionSummary::from_tally(
            ProgressTally {
                total: 12,
                converted: 10,
                failed: 2,
            },
            Duration::from_secs(5),
            PathBuf::from("/out"),
        );

        assert_eq!(summary.files_per_second(), 2.0);
        assert_eq!(summary.output_dir, Some(PathBuf::from("/out")));
    }

    #[test]
    fn test_quality_checked_before_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        RgbImage::from_pixel(10, 10, Rgb([1, 2, 3]))
            .save(temp_dir.path().join("a.png"))
            .unwrap();

        let config = ConvertConfig::new(temp_dir.path()).quality_decrease(Some(150));
        let err = BatchConverter::new(config).run().unwrap_err();

        assert!(matches!(err, ConvertError::QualityOutOfRange { value: 150 }));
        assert!(!temp_dir.path().join("_converted").exists());
    }

    #[test]
    fn test_run_small_batch() {
        let temp_dir = TempDir::new().unwrap();
        for (index, name) in ["a.png", "b.bmp", "c.tiff"].iter().enumerate() {
            RgbImage::from_pixel(40, 20, Rgb([index as u8 * 80, 0, 0]))
                .save(temp_dir.path().join(name))
                .unwrap();
        }

        let config = ConvertConfig::new(temp_dir.path())
            .quality_decrease(Some(50))
            .workers(2);
        let summary = BatchConverter::new(config).run().unwrap();

        assert_eq!((summary.total, summary.converted, summary.failed), (3, 3, 0));
        let output_dir = temp_dir.path().join("_converted");
        for name in ["1_a.jpg", "2_b.jpg", "3_c.jpg"] {
            assert_eq!(image::image_dimensions(output_dir.join(name)).unwrap(), (20, 10));
        }
    }
}
