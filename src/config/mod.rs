//! Configuration for a conversion run

use std::path::{Path, PathBuf};
use crate::error::{Result, ConvertError};

/// Name of the output subdirectory created directly under the input directory
pub const OUTPUT_DIR_NAME: &str = "_converted";

/// Number of work items handed to a worker per dispatch
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Settings for one invocation of the converter
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Directory scanned recursively for images
    pub input_dir: PathBuf,

    /// Raw percentage as supplied by the caller; validated when the run starts
    pub quality_decrease: Option<i64>,

    /// Worker threads in the pool
    pub workers: usize,

    /// Work items per dispatch
    pub chunk_size: usize,

    /// Draw a live progress bar
    pub show_progress: bool,
}

impl ConvertConfig {
    /// Create a configuration with default pool sizing and no resize
    pub fn new<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
            quality_decrease: None,
            workers: num_cpus::get(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            show_progress: false,
        }
    }

    /// Set the percentage by which both dimensions shrink
    pub fn quality_decrease(mut self, quality_decrease: Option<i64>) -> Self {
        self.quality_decrease = quality_decrease;
        self
    }

    /// Override the worker count (defaults to the number of logical CPUs)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Enable or disable the progress bar
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Directory the converted files are written to
    pub fn output_dir(&self) -> PathBuf {
        output_dir_for(&self.input_dir)
    }

    /// Validate and parse the quality decrease
    pub fn resolved_quality(&self) -> Result<Option<QualityDecrease>> {
        QualityDecrease::from_raw(self.quality_decrease)
    }
}

/// Output directory for a given input directory
pub fn output_dir_for(input_dir: &Path) -> PathBuf {
    input_dir.join(OUTPUT_DIR_NAME)
}

/// Validated, strictly positive downscale percentage (1..=100)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityDecrease(u8);

impl QualityDecrease {
    /// Interpret a raw percentage.
    ///
    /// Absent, zero and negative values mean "keep original dimensions" and
    /// yield `Ok(None)`. Values above 100 are rejected.
    pub fn from_raw(raw: Option<i64>) -> Result<Option<Self>> {
        match raw {
            None => Ok(None),
            Some(value) if value <= 0 => Ok(None),
            Some(value) if value > 100 => Err(ConvertError::QualityOutOfRange { value }),
            Some(value) => Ok(Some(Self(value as u8))),
        }
    }

    /// Percentage value
    pub fn percent(self) -> u8 {
        self.0
    }

    /// Scale one dimension by `1 - percent / 100`, truncating toward zero.
    ///
    /// Exact integer arithmetic: 100px at 7% is 93, not the 92 a binary
    /// float product would truncate to.
    ///
    /// Never returns less than 1.
    pub fn scale(self, dimension: u32) -> u32 {
        let kept = u64::from(100 - self.0);
        let scaled = u64::from(dimension) * kept / 100;
        (scaled as u32).max(1)
    }
}
