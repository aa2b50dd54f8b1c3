//! jpegify - parallel batch conversion of image trees to JPEG
//!
//! Scans a directory recursively for images (JPEG, PNG, HEIC, DNG, BMP,
//! TIFF, GIF), optionally shrinks each one by a percentage and re-encodes it
//! as a quality-100 JPEG named `{ordinal}_{stem}.jpg` inside a `_converted`
//! subdirectory. Files are independent and processed on a worker pool sized
//! to the available CPUs.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jpegify::{BatchConverter, ConvertConfig};
//!
//! let config = ConvertConfig::new("photos").quality_decrease(Some(50));
//! let summary = BatchConverter::new(config).run()?;
//!
//! println!("{} of {} images converted", summary.converted, summary.total);
//! # Ok::<(), jpegify::ConvertError>(())
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use config::{ConvertConfig, QualityDecrease, OUTPUT_DIR_NAME};
pub use error::{ConvertError, Result};
pub use parallel::{BatchConverter, ConversionSummary};
pub use processing::{process_item, ItemOutcome, WorkItem};

use tracing::debug;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global log subscriber at `level` (`error`, `warn`, `info`,
/// `debug`, `trace` or any filter directive).
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init(level: &str) {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_target(false)
        .with_writer(parallel::progress::LogWriter::default)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        debug!("jpegify v{} initialized", VERSION);
    }
}

/// Convert every supported image under `input_dir`.
///
/// Convenience wrapper over [`BatchConverter`] with default pool sizing and
/// no progress bar.
pub fn convert_images<P: Into<std::path::PathBuf>>(
    input_dir: P,
    quality_decrease: Option<i64>,
) -> Result<ConversionSummary> {
    let config = ConvertConfig::new(input_dir).quality_decrease(quality_decrease);
    BatchConverter::new(config).run()
}
