//! Per-file transform: the unit of work the batch engine runs

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{BatchConfig, OutputFormat};
use crate::error::{Result, ResampleError};

pub mod formats;
pub mod resize;

pub use formats::*;
pub use resize::*;

/// Transform settings bound into every task at planning time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformParams {
    pub size_limit: u32,
    pub format: OutputFormat,
    pub quality: Option<u8>,
    pub keep_alpha: bool,
}

impl From<&BatchConfig> for TransformParams {
    fn from(config: &BatchConfig) -> Self {
        Self {
            size_limit: config.size_limit,
            format: config.output_format,
            quality: config.quality,
            keep_alpha: config.keep_alpha,
        }
    }
}

/// One source file bound to its destination and settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub params: TransformParams,
}

impl Task {
    /// File name shown when the task succeeds
    pub fn display_name(&self) -> String {
        file_name_of(&self.destination)
    }
}

/// Result of running one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Output written; carries the name to display
    Success(String),
    /// Nothing written; carries a human-readable reason
    Failure(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(name) => f.write_str(name),
            Self::Failure(reason) => write!(f, "{} {}", FAILURE_MARKER, reason),
        }
    }
}

/// Prefix of the progress label shown for a failed task
pub const FAILURE_MARKER: &str = "[ERR]";

/// A unit of work the engine can run on a worker thread.
///
/// Implementations report every problem as `Outcome::Failure`; they do not
/// share mutable state with the engine.
pub trait Transform: Send + Sync {
    fn transform(&self, task: &Task) -> Outcome;
}

impl<F> Transform for F
where
    F: Fn(&Task) -> Outcome + Send + Sync,
{
    fn transform(&self, task: &Task) -> Outcome {
        self(task)
    }
}

/// Decode, fit to the long-edge limit, re-encode
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageResampler;

impl ImageResampler {
    pub fn new() -> Self {
        Self
    }

    /// Process a single file, propagating the first error
    pub fn process(&self, task: &Task) -> Result<String> {
        let params = task.params;
        debug!("Processing file: {:?} -> {:?}", task.source, task.destination);

        let data = std::fs::read(&task.source)?;
        let image = image::load_from_memory(&data)
            .map_err(|source| ResampleError::DecodeError {
                file: task.source.clone(),
                source,
            })?;

        let keep_alpha = params.keep_alpha && params.format.supports_alpha();
        let resampled = resample(image, params.size_limit, keep_alpha);

        let bytes = encode(&resampled, params.format, params.quality)
            .map_err(|source| ResampleError::EncodeError {
                file: task.destination.clone(),
                source,
            })?;

        write_output(&task.destination, &bytes)?;

        debug!("Saved image: {}x{} ({:.2}MB) to {:?}",
               resampled.width(), resampled.height(),
               bytes.len() as f64 / 1024.0 / 1024.0,
               task.destination);

        Ok(task.display_name())
    }
}

impl Transform for ImageResampler {
    fn transform(&self, task: &Task) -> Outcome {
        match self.process(task) {
            Ok(name) => Outcome::Success(name),
            Err(ResampleError::IoError(e)) => {
                Outcome::Failure(format!("{}: {}", task.source.display(), e))
            }
            Err(e) => Outcome::Failure(e.to_string()),
        }
    }
}

/// Write the encoded file, leaving nothing behind if the write fails
fn write_output(destination: &Path, bytes: &[u8]) -> Result<()> {
    if let Err(e) = std::fs::write(destination, bytes) {
        let _ = std::fs::remove_file(destination);
        return Err(e.into());
    }
    Ok(())
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
