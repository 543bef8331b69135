//! Error types and handling for imgresample

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imgresample operations
pub type Result<T> = std::result::Result<T, ResampleError>;

/// Main error type for imgresample operations
#[derive(Debug, Error)]
pub enum ResampleError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors, detected before any task is planned
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A discovered file does not live under the input root
    #[error("{path:?} is not located under the input root {root:?}")]
    PathError { path: PathBuf, root: PathBuf },

    /// Two source files would be written to the same destination
    #[error("{first:?} and {second:?} would both be written to {destination:?}")]
    DestinationCollision {
        destination: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    /// Source file could not be decoded
    #[error("failed to decode {file:?}: {source}")]
    DecodeError {
        file: PathBuf,
        source: image::ImageError,
    },

    /// Resampled image could not be encoded or written
    #[error("failed to encode {file:?}: {source}")]
    EncodeError {
        file: PathBuf,
        source: image::ImageError,
    },

    /// Zip archive errors
    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    /// Archive entry that would land outside the extraction directory
    #[error("Unsafe archive entry: {entry}")]
    UnsafeArchiveEntry { entry: String },

    /// Directory traversal errors
    #[error("Directory walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    /// Worker pool errors
    #[error("Parallel processing error: {message}")]
    ParallelError { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),
}

impl ResampleError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new parallel processing error
    pub fn parallel<S: Into<String>>(message: S) -> Self {
        Self::ParallelError {
            message: message.into(),
        }
    }

    /// Create an error for a file found outside the input root
    pub fn outside_root(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self::PathError {
            path: path.into(),
            root: root.into(),
        }
    }
}

impl From<toml::de::Error> for ResampleError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for ResampleError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}

impl From<serde_json::Error> for ResampleError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerdeError(format!("JSON parsing error: {}", err))
    }
}

impl From<rayon::ThreadPoolBuildError> for ResampleError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::parallel(format!("failed to start worker pool: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ResampleError::config("test message");
        assert!(matches!(err, ResampleError::ConfigError { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_outside_root_message() {
        let err = ResampleError::outside_root("/elsewhere/a.png", "/in");
        let msg = err.to_string();
        assert!(msg.contains("/elsewhere/a.png"));
        assert!(msg.contains("/in"));
    }
}
