//! imgresample - batch image resampler
//!
//! Mirrors a directory tree of images into an output tree, capping the long
//! edge of every image and re-encoding it in one output format. Work runs on
//! a bounded pool of worker threads; one bad file never stops the batch.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use imgresample::{discovery, process_batch, BatchConfig, ImageResampler, OutputFormat};
//!
//! let config = BatchConfig::new("photos", "resized")
//!     .size_limit(1600)
//!     .format(OutputFormat::Webp)
//!     .normalized();
//! config.validate()?;
//!
//! let images = discovery::filter_images(discovery::list_files(&config.input_root)?);
//! let report = process_batch(&config, &images, Arc::new(ImageResampler::new()), true)?;
//!
//! for (i, reason) in report.errors.iter().enumerate() {
//!     eprintln!("#{} {}", i, reason);
//! }
//! # Ok::<(), imgresample::ResampleError>(())
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod discovery;
pub mod error;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use config::{BatchConfig, Concurrency, OutputFormat, Preset};
pub use error::{Result, ResampleError};
pub use parallel::{process_batch, BatchExecutor, BatchReport, ProgressSink};
pub use processing::{ImageResampler, Outcome, Task, Transform};

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global log subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level` when set. Later calls are
/// no-ops.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        debug!("imgresample v{} logging initialized", VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_init_logging_twice() {
        // Should not fail on multiple calls
        init_logging("debug");
        init_logging("not a valid filter [");
    }
}
