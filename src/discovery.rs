//! Input enumeration

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;
use crate::processing::is_image_path;

/// Every regular file under `root`, recursively, sorted by path.
///
/// Symbolic links are followed; a linked file is listed under the path of
/// the link.
pub fn list_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root.as_ref()).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    // Sort files for consistent processing order
    files.sort();
    debug!("Found {} files under {:?}", files.len(), root.as_ref());
    Ok(files)
}

/// Keep the files with a recognised image extension, in order
pub fn filter_images(files: Vec<PathBuf>) -> Vec<PathBuf> {
    files.into_iter().filter(|path| is_image_path(path)).collect()
}
