//! Zip archives as input or output roots
//!
//! An input archive is extracted into a temporary directory that then acts
//! as the input root. An output archive is staged in a temporary directory
//! and packed once the batch is done. Temporary directories are removed on
//! drop.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, ResampleError};

/// Whether a path names a zip archive
pub fn is_zip<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Input root, extracted first when an archive is given
#[derive(Debug)]
pub struct InputRoot {
    path: PathBuf,
    _extracted: Option<TempDir>,
}

impl InputRoot {
    pub fn resolve(path: &Path) -> Result<Self> {
        if !is_zip(path) {
            return Ok(Self { path: path.to_path_buf(), _extracted: None });
        }

        if !path.is_file() {
            return Err(ResampleError::config(
                format!("Input archive does not exist: {}", path.display())
            ));
        }

        let staging = staging_dir()?;
        extract_zip(path, staging.path())?;
        info!("Extracted {:?} into {:?}", path, staging.path());

        Ok(Self {
            path: staging.path().to_path_buf(),
            _extracted: Some(staging),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Output root, staged when the result goes into an archive
#[derive(Debug)]
pub struct OutputRoot {
    path: PathBuf,
    archive: Option<(PathBuf, TempDir)>,
}

impl OutputRoot {
    /// An archive output must not exist yet and its directory must
    pub fn resolve(path: &Path) -> Result<Self> {
        if !is_zip(path) {
            return Ok(Self { path: path.to_path_buf(), archive: None });
        }

        if path.exists() {
            return Err(ResampleError::config(
                format!("Output archive already exists: {}", path.display())
            ));
        }

        match path.parent() {
            Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => {}
            _ => {
                return Err(ResampleError::config(
                    format!("Directory for the output archive must exist: {}", path.display())
                ));
            }
        }

        let staging = staging_dir()?;
        debug!("Staging output for {:?} in {:?}", path, staging.path());

        Ok(Self {
            path: staging.path().to_path_buf(),
            archive: Some((path.to_path_buf(), staging)),
        })
    }

    /// Directory the batch writes into
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_archive(&self) -> bool {
        self.archive.is_some()
    }

    /// Pack the staged output if needed; returns the final location
    pub fn finish(self) -> Result<PathBuf> {
        match self.archive {
            None => Ok(self.path),
            Some((archive, staging)) => {
                let entries = pack_dir(staging.path(), &archive)?;
                info!("Packed {} entries into {:?}", entries, archive);
                Ok(archive)
            }
        }
    }
}

fn staging_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix("imgresample-").tempdir()?)
}

/// Extract every entry of `source` under `target`
pub fn extract_zip(source: &Path, target: &Path) -> Result<()> {
    let file = File::open(source)?;
    let mut archive = ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let destination = target.join(sanitize_entry_name(entry.name())?);

        if entry.is_dir() {
            fs::create_dir_all(&destination)?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut output = File::create(&destination)?;
        io::copy(&mut entry, &mut output)?;
    }

    Ok(())
}

/// Relative path of an entry, rejecting names that would escape the target
fn sanitize_entry_name(entry: &str) -> Result<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return Err(ResampleError::UnsafeArchiveEntry { entry: entry.to_string() });
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => return Err(ResampleError::UnsafeArchiveEntry { entry: entry.to_string() }),
        }
    }

    Ok(sanitized)
}

/// Deflate the contents of `source` into a new archive at `archive`.
///
/// Returns the number of entries written. A partially written archive is
/// removed.
pub fn pack_dir(source: &Path, archive: &Path) -> Result<usize> {
    let result = write_archive(source, archive);
    if result.is_err() {
        let _ = fs::remove_file(archive);
    }
    result
}

fn write_archive(source: &Path, archive: &Path) -> Result<usize> {
    let mut writer = ZipWriter::new(File::create(archive)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = 0;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| ResampleError::outside_root(entry.path(), source))?;
        let name = entry_name(relative);

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            io::copy(&mut File::open(entry.path())?, &mut writer)?;
        } else {
            continue;
        }
        entries += 1;
    }

    writer.finish()?;
    Ok(entries)
}

/// Archive entry names always use `/`
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
