//! Saved defaults for the transform settings

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::{
    BatchConfig, Concurrency, OutputFormat, DEFAULT_CONCURRENCY, DEFAULT_QUALITY, DEFAULT_SIZE_LIMIT,
};
use crate::error::{Result, ResampleError};

/// File looked up in the working directory when no preset is named
pub const DEFAULT_PRESET_FILE: &str = "preset.json";

/// Partial transform settings; unset fields fall through to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    /// Long-edge limit in pixels
    #[serde(default, alias = "img_size", skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<u32>,

    /// Output format
    #[serde(default, alias = "img_format", skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,

    /// Encoder quality; -1 in older presets means "no quality"
    #[serde(default, alias = "img_quality", deserialize_with = "quality_or_none",
            skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,

    /// Keep alpha channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alpha: Option<bool>,

    /// Worker count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<Concurrency>,
}

fn quality_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    match raw {
        None | Some(-1) => Ok(None),
        Some(q) => u8::try_from(q)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("quality out of range: {}", q))),
    }
}

impl Preset {
    /// Preset holding every built-in default
    pub fn defaults() -> Self {
        Self {
            size_limit: Some(DEFAULT_SIZE_LIMIT),
            format: Some(OutputFormat::Jpeg),
            quality: Some(DEFAULT_QUALITY),
            keep_alpha: Some(true),
            concurrency: Some(Concurrency::default()),
        }
    }

    /// Load a preset; the format is chosen by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ResampleError::config(
                format!("Failed to read preset file {:?}: {}", path.as_ref(), e)
            ))?;

        match extension_of(path.as_ref()).as_str() {
            "json" => serde_json::from_str(&content).map_err(Into::into),
            "toml" => toml::from_str(&content).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            _ => Err(ResampleError::config(
                "Unsupported preset file format. Use .json, .toml or .yaml"
            )),
        }
    }

    /// Load the named preset, or `preset.json` from the working directory if
    /// it exists. Only an explicitly named preset is required to exist.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<(PathBuf, Self)>> {
        if let Some(path) = explicit {
            return Ok(Some((path.to_path_buf(), Self::from_file(path)?)));
        }

        let fallback = PathBuf::from(DEFAULT_PRESET_FILE);
        if fallback.is_file() {
            debug!("Found preset in working directory: {:?}", fallback);
            return Ok(Some((fallback.clone(), Self::from_file(&fallback)?)));
        }

        Ok(None)
    }

    /// Save the preset; the format is chosen by extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = match extension_of(path.as_ref()).as_str() {
            "json" => serde_json::to_string_pretty(self)?,
            "toml" => toml::to_string_pretty(self)
                .map_err(|e| ResampleError::config(format!("TOML serialization failed: {}", e)))?,
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            _ => return Err(ResampleError::config(
                "Unsupported preset file format. Use .json, .toml or .yaml"
            )),
        };

        std::fs::write(&path, content)
            .map_err(|e| ResampleError::config(
                format!("Failed to write preset file {:?}: {}", path.as_ref(), e)
            ))?;

        Ok(())
    }

    /// Fields set in `other` win
    pub fn merge(self, other: Preset) -> Self {
        Self {
            size_limit: other.size_limit.or(self.size_limit),
            format: other.format.or(self.format),
            quality: other.quality.or(self.quality),
            keep_alpha: other.keep_alpha.or(self.keep_alpha),
            concurrency: other.concurrency.or(self.concurrency),
        }
    }

    /// Build the batch configuration for the given roots
    pub fn into_config(self, input_root: PathBuf, output_root: PathBuf) -> BatchConfig {
        let defaults = Self::defaults().merge(self);
        BatchConfig::new(input_root, output_root)
            .size_limit(defaults.size_limit.unwrap_or(DEFAULT_SIZE_LIMIT))
            .format(defaults.format.unwrap_or(OutputFormat::Jpeg))
            .quality(defaults.quality)
            .keep_alpha(defaults.keep_alpha.unwrap_or(true))
            .concurrency(defaults.concurrency.unwrap_or_default())
            .normalized()
    }

    /// Ask for every setting still unset, in the order they apply.
    ///
    /// `ask` gets a prompt and the default shown to the user and returns the
    /// raw answer; an empty answer takes the default. Invalid answers are
    /// asked again. Quality is skipped for png and alpha for jpeg.
    pub fn fill_missing<F>(mut self, mut ask: F) -> Result<Self>
    where
        F: FnMut(&str, &str) -> Result<String>,
    {
        if self.size_limit.is_none() {
            self.size_limit = Some(ask_until(&mut ask, "Size limit (long edge, pixels)",
                &DEFAULT_SIZE_LIMIT.to_string(), |answer| {
                    answer.parse::<u32>().ok().filter(|&size| size > 0)
                })?);
        }

        if self.format.is_none() {
            self.format = Some(ask_until(&mut ask, "Output format (jpg, webp, png)",
                OutputFormat::Jpeg.extension(), |answer| answer.parse().ok())?);
        }
        let format = self.format.unwrap_or(OutputFormat::Jpeg);

        if self.quality.is_none() && format.supports_quality() {
            self.quality = Some(ask_until(&mut ask, "Quality (1-100)",
                &DEFAULT_QUALITY.to_string(), |answer| {
                    answer.parse::<u8>().ok().filter(|q| (1..=100).contains(q))
                })?);
        }

        if self.keep_alpha.is_none() && format.supports_alpha() {
            self.keep_alpha = Some(ask_until(&mut ask, "Keep alpha channel? (y/n)", "y",
                |answer| match answer.to_lowercase().as_str() {
                    "y" | "yes" => Some(true),
                    "n" | "no" => Some(false),
                    _ => None,
                })?);
        }

        if self.concurrency.is_none() {
            self.concurrency = Some(ask_until(&mut ask, "Workers (number, all or half)",
                &DEFAULT_CONCURRENCY.to_string(), |answer| answer.parse().ok())?);
        }

        Ok(self)
    }

    /// `key: value` lines of the fields that are set
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(size_limit) = self.size_limit {
            lines.push(format!("size_limit: {}", size_limit));
        }
        if let Some(format) = self.format {
            lines.push(format!("format: {}", format));
        }
        if let Some(quality) = self.quality {
            lines.push(format!("quality: {}", quality));
        }
        if let Some(keep_alpha) = self.keep_alpha {
            lines.push(format!("keep_alpha: {}", keep_alpha));
        }
        if let Some(concurrency) = self.concurrency {
            lines.push(format!("concurrency: {}", concurrency));
        }
        lines
    }
}

fn ask_until<T, F, P>(ask: &mut F, prompt: &str, default: &str, parse: P) -> Result<T>
where
    F: FnMut(&str, &str) -> Result<String>,
    P: Fn(&str) -> Option<T>,
{
    loop {
        let answer = ask(prompt, default)?;
        let answer = answer.trim();
        let answer = if answer.is_empty() { default } else { answer };
        match parse(answer) {
            Some(value) => return Ok(value),
            None => debug!("Rejected answer {:?} for {:?}", answer, prompt),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}
