//! Input discovery and work planning

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{QualityDecrease, OUTPUT_DIR_NAME};
use crate::error::{ConvertError, Result};
use crate::processing::{is_supported_input_path, WorkItem};

/// Recursively collect every supported image under `input_dir`.
///
/// Entries are visited in file-name order within each directory, so the
/// result is stable for an unchanged tree. The `_converted` directory directly
/// under `input_dir` is never entered.
pub fn discover_images(input_dir: &Path) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(ConvertError::invalid_input(input_dir));
    }

    let output_dir = input_dir.join(OUTPUT_DIR_NAME);
    let mut files = Vec::new();

    let walker = WalkDir::new(input_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.path() == output_dir));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_supported_input_path(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!("Discovered {} candidate images under {:?}", files.len(), input_dir);
    Ok(files)
}

/// Number the discovered files from 1 and bind them to the run parameters
pub fn plan_work(
    files: Vec<PathBuf>,
    output_dir: &Path,
    quality_decrease: Option<QualityDecrease>,
) -> Vec<WorkItem> {
    files
        .into_iter()
        .enumerate()
        .map(|(index, path)| {
            WorkItem::new(path, output_dir.to_path_buf(), quality_decrease, index + 1)
        })
        .collect()
}
