//! Configuration management for imgresample

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::{Result, ResampleError};

pub mod preset;
pub use preset::*;

/// Default long-edge limit in pixels
pub const DEFAULT_SIZE_LIMIT: u32 = 2400;

/// Default encoder quality for lossy formats
pub const DEFAULT_QUALITY: u8 = 90;

/// Default number of workers
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Settings for one batch run. Read-only once planning starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchConfig {
    /// Directory the images are read from
    pub input_root: PathBuf,

    /// Directory the mirrored tree is written to
    pub output_root: PathBuf,

    /// Long-edge cap in pixels
    pub size_limit: u32,

    /// Encoding of every output file
    pub output_format: OutputFormat,

    /// Encoder quality (1-100), absent for formats without one
    pub quality: Option<u8>,

    /// Keep the alpha channel of sources that have one
    pub keep_alpha: bool,

    /// Number of transforms allowed to run at once
    pub concurrency: usize,
}

impl BatchConfig {
    /// Create a configuration with the default transform settings
    pub fn new<P: Into<PathBuf>>(input_root: P, output_root: P) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            size_limit: DEFAULT_SIZE_LIMIT,
            output_format: OutputFormat::Jpeg,
            quality: Some(DEFAULT_QUALITY),
            keep_alpha: true,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the long-edge limit
    pub fn size_limit(mut self, size_limit: u32) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Set the output format
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set the encoder quality
    pub fn quality(mut self, quality: Option<u8>) -> Self {
        self.quality = quality;
        self
    }

    /// Set whether alpha is kept
    pub fn keep_alpha(mut self, keep_alpha: bool) -> Self {
        self.keep_alpha = keep_alpha;
        self
    }

    /// Set the worker count, resolving the symbolic values
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency.resolve();
        self
    }

    /// Drop settings that the output format cannot use.
    ///
    /// PNG has no quality, JPEG has no alpha channel, and lossy formats
    /// always carry a quality.
    pub fn normalized(mut self) -> Self {
        if self.output_format.supports_quality() {
            self.quality.get_or_insert(DEFAULT_QUALITY);
        } else {
            self.quality = None;
        }
        if !self.output_format.supports_alpha() {
            self.keep_alpha = false;
        }
        self.concurrency = self.concurrency.max(1);
        self
    }

    /// Validate the transform settings and the input/output roots
    pub fn validate(&self) -> Result<()> {
        if self.size_limit == 0 {
            return Err(ResampleError::config("Size limit must be greater than 0"));
        }

        if let Some(quality) = self.quality {
            if quality == 0 || quality > 100 {
                return Err(ResampleError::config(
                    format!("Quality must be between 1-100, got {}", quality)
                ));
            }
        }

        if self.concurrency == 0 {
            return Err(ResampleError::config("Concurrency must be greater than 0"));
        }

        if !self.input_root.is_dir() {
            return Err(ResampleError::config(
                format!("Input directory does not exist: {}", self.input_root.display())
            ));
        }

        if !self.output_root.is_dir() {
            return Err(ResampleError::config(
                format!("Output directory must exist: {}", self.output_root.display())
            ));
        }

        if same_location(&self.input_root, &self.output_root)? {
            return Err(ResampleError::config(
                "Input and output paths must be different"
            ));
        }

        Ok(())
    }
}

/// Compare two existing paths after resolving symlinks and `..`
fn same_location(a: &Path, b: &Path) -> Result<bool> {
    Ok(a.canonicalize()? == b.canonicalize()?)
}

/// Output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Webp,
    Png,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Png => "png",
        }
    }

    /// Whether the encoder takes a quality setting
    pub fn supports_quality(self) -> bool {
        !matches!(self, Self::Png)
    }

    /// Whether the format can store an alpha channel
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "png" => Ok(Self::Png),
            other => Err(ResampleError::config(
                format!("Unsupported output format '{}'. Use jpg, webp or png", other)
            )),
        }
    }
}

/// Requested worker count before it is resolved against the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConcurrencyValue", into = "ConcurrencyValue")]
pub enum Concurrency {
    /// Exactly this many workers (0 is treated as 1)
    Fixed(usize),
    /// All logical CPUs
    All,
    /// Half of the logical CPUs, at least one
    Half,
}

impl Concurrency {
    /// Resolve to a concrete, positive worker count
    pub fn resolve(self) -> usize {
        self.resolve_with(num_cpus::get())
    }

    fn resolve_with(self, cpus: usize) -> usize {
        match self {
            Self::Fixed(n) => n.max(1),
            Self::All => cpus.max(1),
            Self::Half => (cpus / 2).max(1),
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::Fixed(DEFAULT_CONCURRENCY)
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{}", n),
            Self::All => f.write_str("all"),
            Self::Half => f.write_str("half"),
        }
    }
}

impl FromStr for Concurrency {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "max" => Ok(Self::All),
            "half" => Ok(Self::Half),
            number => number.parse::<usize>()
                .map(Self::Fixed)
                .map_err(|_| ResampleError::config(
                    format!("Concurrency must be a number, 'all' or 'half', got '{}'", s.trim())
                )),
        }
    }
}

/// Serialized form: a bare number or one of the names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ConcurrencyValue {
    Number(usize),
    Name(String),
}

impl TryFrom<ConcurrencyValue> for Concurrency {
    type Error = ResampleError;

    fn try_from(value: ConcurrencyValue) -> Result<Self> {
        match value {
            ConcurrencyValue::Number(n) => Ok(Self::Fixed(n)),
            ConcurrencyValue::Name(name) => name.parse(),
        }
    }
}

impl From<Concurrency> for ConcurrencyValue {
    fn from(value: Concurrency) -> Self {
        match value {
            Concurrency::Fixed(n) => Self::Number(n),
            Concurrency::All => Self::Name("all".to_string()),
            Concurrency::Half => Self::Name("half".to_string()),
        }
    }
}

/// Turn a typed or pasted path into an absolute one.
///
/// Terminals wrap dragged-in paths in quotes, so surrounding quotes are removed.
pub fn normalize_path(raw: &str) -> Result<PathBuf> {
    let trimmed = raw.trim().trim_matches('"').trim_matches('\'');
    if trimmed.is_empty() {
        return Err(ResampleError::config("Path must not be empty"));
    }
    let path = PathBuf::from(trimmed);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
