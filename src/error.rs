//! Error types and handling for jpegify

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for jpegify operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Main error type for jpegify operations
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Input path is missing or not a directory
    #[error("Input directory '{}' does not exist.", path.display())]
    InvalidInput { path: PathBuf },

    /// Quality decrease above 100% would produce non-positive dimensions
    #[error("Quality decrease must be at most 100 (got {value})")]
    QualityOutOfRange { value: i64 },

    /// The `_converted` directory could not be created
    #[error("Failed to create output directory '{}': {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Worker pool construction failed
    #[error("Worker pool error: {message}")]
    Pool { message: String },

    /// Image could not be decoded
    #[error("cannot decode image: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Image could not be encoded as JPEG
    #[error("cannot encode JPEG: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Reading the source or writing the output failed
    #[error("I/O error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// RAW container without a usable embedded preview
    #[error("no decodable embedded preview found")]
    NoEmbeddedPreview { path: PathBuf },
}

impl ConvertError {
    /// Create a new invalid input error
    pub fn invalid_input<P: Into<PathBuf>>(path: P) -> Self {
        Self::InvalidInput { path: path.into() }
    }

    /// Create a new worker pool error
    pub fn pool<S: Into<String>>(message: S) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }

    /// Create a new decode error for `path`
    pub fn decode(path: &Path, source: image::ImageError) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a new encode error for `path`
    pub fn encode(path: &Path, source: image::ImageError) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a new I/O error for `path`
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::InvalidInput { path }
            | Self::OutputDirectory { path, .. }
            | Self::Decode { path, .. }
            | Self::Encode { path, .. }
            | Self::Io { path, .. }
            | Self::NoEmbeddedPreview { path } => Some(path),

            Self::QualityOutOfRange { .. } | Self::Pool { .. } => None,
        }
    }
}

/// Error context extension for attaching a file path to I/O failures
pub trait ErrorContext<T> {
    /// Add file context to an error
    fn with_file_context(self, file: &Path) -> Result<T>;
}

impl<T> ErrorContext<T> for std::result::Result<T, std::io::Error> {
    fn with_file_context(self, file: &Path) -> Result<T> {
        self.map_err(|e| ConvertError::io(file, e))
    }
}
