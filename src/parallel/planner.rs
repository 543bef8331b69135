//! Task planning: map each source file to its place in the output tree

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::BatchConfig;
use crate::error::{Result, ResampleError};
use crate::parallel::progress::{display_label, ProgressSink};
use crate::processing::{file_name_of, Task, TransformParams};

/// Build one task per source file, in input order.
///
/// The directory layout under the input root is mirrored under the output
/// root and the extension is replaced by that of the output format. Every
/// destination directory exists once this returns. Each file produces one
/// progress update.
pub fn plan<P: AsRef<Path>>(
    config: &BatchConfig,
    files: &[P],
    progress: &dyn ProgressSink,
) -> Result<Vec<Task>> {
    let params = TransformParams::from(config);
    let extension = config.output_format.extension();

    let mut tasks = Vec::with_capacity(files.len());
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::with_capacity(files.len());
    let mut created: HashSet<PathBuf> = HashSet::new();

    for source in files {
        let source = source.as_ref();
        let relative = source
            .strip_prefix(&config.input_root)
            .map_err(|_| ResampleError::outside_root(source, &config.input_root))?;

        let directory = match relative.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => config.output_root.join(parent),
            _ => config.output_root.clone(),
        };

        if created.insert(directory.clone()) {
            std::fs::create_dir_all(&directory)?;
            debug!("Prepared output directory {:?}", directory);
        }

        let destination = directory.join(output_file_name(relative, extension));

        if let Some(first) = claimed.insert(destination.clone(), source.to_path_buf()) {
            return Err(ResampleError::DestinationCollision {
                destination,
                first,
                second: source.to_path_buf(),
            });
        }

        progress.advance(&display_label(&file_name_of(source)));

        tasks.push(Task {
            source: source.to_path_buf(),
            destination,
            params,
        });
    }

    info!("Planned {} tasks into {:?}", tasks.len(), config.output_root);
    Ok(tasks)
}

/// `photo.tiff` becomes `photo.<extension>`; only the last extension is replaced
fn output_file_name(relative: &Path, extension: &str) -> OsString {
    let mut name = relative
        .file_stem()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".");
    name.push(extension);
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use crate::config::OutputFormat;
    use crate::parallel::progress::LABEL_WIDTH;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressSink for Recorder {
        fn advance(&self, label: &str) {
            self.0.lock().unwrap().push(label.to_string());
        }
    }

    fn config(input: &Path, output: &Path) -> BatchConfig {
        BatchConfig::new(input, output).format(OutputFormat::Jpeg).normalized()
    }

    #[test]
    fn test_mirrors_tree_and_swaps_extension() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = input.path().join("a/b/c.png");
        let recorder = Recorder::default();

        let tasks = plan(&config(input.path(), output.path()), &[&source], &recorder).unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].source, source);
        assert_eq!(tasks[0].destination, output.path().join("a/b/c.jpg"));
        assert_eq!(tasks[0].params.format, OutputFormat::Jpeg);
        assert!(output.path().join("a/b").is_dir());

        let labels = recorder.0.lock().unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].trim_end(), "c.png");
        assert_eq!(labels[0].chars().count(), LABEL_WIDTH);
    }

    #[test]
    fn test_preserves_input_order() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let files: Vec<PathBuf> = ["z.png", "a.png", "m/b.gif"]
            .iter()
            .map(|name| input.path().join(name))
            .collect();

        let tasks = plan(&config(input.path(), output.path()), &files, &Recorder::default()).unwrap();
        let sources: Vec<_> = tasks.iter().map(|t| t.source.clone()).collect();
        assert_eq!(sources, files);
        assert_eq!(tasks[0].destination, output.path().join("z.jpg"));
    }

    #[test]
    fn test_directory_creation_is_idempotent() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::create_dir_all(output.path().join("x")).unwrap();
        let files = [input.path().join("x/1.png"), input.path().join("x/2.png")];
        let cfg = config(input.path(), output.path());

        plan(&cfg, &files, &Recorder::default()).unwrap();
        plan(&cfg, &files, &Recorder::default()).unwrap();
        assert!(output.path().join("x").is_dir());
    }

    #[test]
    fn test_only_last_extension_replaced() {
        assert_eq!(output_file_name(Path::new("dir/archive.tar.png"), "webp"), OsString::from("archive.tar.webp"));
    }

    #[test]
    fn test_empty_input() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let files: Vec<PathBuf> = Vec::new();

        let tasks = plan(&config(input.path(), output.path()), &files, &recorder).unwrap();
        assert!(tasks.is_empty());
        assert!(recorder.0.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_file_outside_root_is_rejected() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let stray = PathBuf::from("/somewhere/else/a.png");

        let err = plan(&config(input.path(), output.path()), &[stray], &Recorder::default()).unwrap_err();
        assert!(matches!(err, ResampleError::PathError { .. }));
        assert!(!output.path().join("somewhere").exists());
    }

    #[test]
    fn test_colliding_destinations_are_fatal() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let files = [input.path().join("p/photo.png"), input.path().join("p/photo.gif")];

        let err = plan(&config(input.path(), output.path()), &files, &Recorder::default()).unwrap_err();
        match err {
            ResampleError::DestinationCollision { destination, first, second } => {
                assert_eq!(destination, output.path().join("p/photo.jpg"));
                assert_eq!(first, files[0]);
                assert_eq!(second, files[1]);
            }
            other => panic!("expected collision, got {:?}", other),
        }
    }
}
