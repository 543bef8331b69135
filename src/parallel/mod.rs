//! Bounded-concurrency batch execution

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use console::style;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BatchConfig;
use crate::error::{Result, ResampleError};
use crate::processing::{Outcome, Task, Transform};

pub mod aggregator;
pub mod planner;
pub mod progress;

pub use aggregator::*;
pub use planner::*;
pub use progress::*;

/// Runs tasks on a fixed number of worker threads
pub struct BatchExecutor {
    workers: usize,
    transform: Arc<dyn Transform>,
}

impl BatchExecutor {
    /// Create an executor; a worker count of 0 is treated as 1
    pub fn new(workers: usize, transform: Arc<dyn Transform>) -> Self {
        let workers = workers.max(1);
        debug!("Initializing batch executor with {} workers", workers);
        Self { workers, transform }
    }

    pub fn from_config(config: &BatchConfig, transform: Arc<dyn Transform>) -> Self {
        Self::new(config.concurrency, transform)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every task and return the failure reasons in completion order.
    ///
    /// Tasks start in the order given, at most `workers` at a time. Each
    /// completion produces exactly one progress update. A failing or
    /// panicking task never stops the others.
    pub fn execute(&self, tasks: Vec<Task>, progress: &dyn ProgressSink) -> Result<Vec<String>> {
        let total = tasks.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let threads = self.workers.min(total);
        info!("Executing {} tasks on {} workers", total, threads);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("resample-{}", i))
            .build()?;

        let (sender, receiver) = crossbeam::channel::unbounded();
        for task in tasks {
            let sender = sender.clone();
            let transform = Arc::clone(&self.transform);
            pool.spawn(move || {
                let outcome = run_isolated(transform.as_ref(), &task);
                // The receiver outlives every job
                let _ = sender.send(outcome);
            });
        }
        drop(sender);

        let mut aggregator = OutcomeAggregator::new();
        for outcome in receiver.iter() {
            aggregator.record(outcome, progress);
        }

        if aggregator.collected() != total {
            return Err(ResampleError::parallel(format!(
                "incomplete batch: {} of {} tasks reported an outcome",
                aggregator.collected(),
                total
            )));
        }

        Ok(aggregator.into_errors())
    }
}

/// Run one transform, turning a panic into a failed outcome
fn run_isolated(transform: &dyn Transform, task: &Task) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(|| transform.transform(task))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            warn!("Transform panicked on {:?}", task.source);
            Outcome::Failure(format!(
                "{}: transform panicked: {}",
                task.source.display(),
                panic_message(payload.as_ref())
            ))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Summary of a finished batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failure reasons in completion order
    pub errors: Vec<String>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs_f64")]
    pub elapsed: Duration,
}

fn as_secs_f64<S: serde::Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl BatchReport {
    pub fn new(total: usize, errors: Vec<String>, elapsed: Duration) -> Self {
        let failed = errors.len();
        Self {
            total,
            succeeded: total.saturating_sub(failed),
            failed,
            errors,
            elapsed,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.succeeded as f64 / secs
        } else {
            0.0
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("Batch Processing Results:");
        println!("  Successful: {}", self.succeeded);
        if self.failed > 0 {
            println!("  Failed: {}", self.failed);
        }
        println!("  Duration: {:.2}s", self.elapsed.as_secs_f64());
        if self.succeeded > 0 {
            println!("  Speed: {:.1} files/sec", self.files_per_second());
        }

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for (i, reason) in self.errors.iter().enumerate() {
                println!("{}", style(format!("[x] #{} {}", i, reason)).red());
            }
        }
    }
}

/// Plan and execute a batch, drawing a bar per phase when `show_progress` is set
pub fn process_batch<P: AsRef<Path>>(
    config: &BatchConfig,
    files: &[P],
    transform: Arc<dyn Transform>,
    show_progress: bool,
) -> Result<BatchReport> {
    let start_time = Instant::now();
    let total = files.len() as u64;

    let planning = ProgressReporter::spawn(total, "plan", show_progress)?;
    let planned = planner::plan(config, files, &planning);
    planning.finish()?;
    let tasks = planned?;

    let count = tasks.len();
    let executor = BatchExecutor::from_config(config, transform);
    let running = ProgressReporter::spawn(total, "resample", show_progress)?;
    let executed = executor.execute(tasks, &running);
    running.finish()?;
    let errors = executed?;

    let report = BatchReport::new(count, errors, start_time.elapsed());
    info!(
        "Batch finished in {:.2}s: {} succeeded, {} failed",
        report.elapsed.as_secs_f64(),
        report.succeeded,
        report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use crate::config::OutputFormat;
    use crate::processing::{TransformParams, FAILURE_MARKER};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressSink for Recorder {
        fn advance(&self, label: &str) {
            self.0.lock().unwrap().push(label.to_string());
        }
    }

    fn tasks(names: &[&str]) -> Vec<Task> {
        names
            .iter()
            .map(|name| Task {
                source: PathBuf::from("/in").join(name),
                destination: PathBuf::from("/out").join(name),
                params: TransformParams {
                    size_limit: 100,
                    format: OutputFormat::Png,
                    quality: None,
                    keep_alpha: true,
                },
            })
            .collect()
    }

    fn succeed(task: &Task) -> Outcome {
        Outcome::Success(task.display_name())
    }

    #[test]
    fn test_every_task_reports() {
        let names: Vec<String> = (0..50).map(|i| format!("{}.png", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let recorder = Recorder::default();

        let errors = BatchExecutor::new(4, Arc::new(succeed))
            .execute(tasks(&names), &recorder)
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(recorder.0.lock().unwrap().len(), 50);
    }

    #[test]
    fn test_failures_are_isolated() {
        let transform = |task: &Task| {
            if task.display_name().starts_with("bad") {
                Outcome::Failure(format!("{}: unreadable", task.display_name()))
            } else {
                Outcome::Success(task.display_name())
            }
        };
        let recorder = Recorder::default();

        let mut errors = BatchExecutor::new(3, Arc::new(transform))
            .execute(tasks(&["ok1.png", "bad1.png", "ok2.png", "bad2.png", "ok3.png"]), &recorder)
            .unwrap();
        errors.sort();

        assert_eq!(errors, ["bad1.png: unreadable", "bad2.png: unreadable"]);
        let labels = recorder.0.lock().unwrap();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels.iter().filter(|l| l.starts_with(FAILURE_MARKER)).count(), 2);
    }

    #[test]
    fn test_failure_reason_has_no_marker() {
        let recorder = Recorder::default();
        let errors = BatchExecutor::new(2, Arc::new(|_: &Task| Outcome::Failure("disk full".into())))
            .execute(tasks(&["a.png"]), &recorder)
            .unwrap();

        assert_eq!(errors, ["disk full"]);
        assert_eq!(recorder.0.lock().unwrap()[0].trim_end(), "[ERR] disk full");
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let transform = {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            move |task: &Task| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(15));
                active.fetch_sub(1, Ordering::SeqCst);
                Outcome::Success(task.display_name())
            }
        };

        let names: Vec<String> = (0..12).map(|i| format!("{}.png", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        BatchExecutor::new(3, Arc::new(transform))
            .execute(tasks(&names), &Recorder::default())
            .unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak concurrency was {}", peak);
    }

    #[test]
    fn test_single_worker_keeps_submission_order() {
        let transform = |task: &Task| Outcome::Failure(task.display_name());
        let errors = BatchExecutor::new(1, Arc::new(transform))
            .execute(tasks(&["c.png", "a.png", "b.png"]), &Recorder::default())
            .unwrap();
        assert_eq!(errors, ["c.png", "a.png", "b.png"]);
    }

    #[test]
    fn test_panic_becomes_failure() {
        let transform = |task: &Task| {
            if task.display_name() == "boom.png" {
                panic!("decoder exploded");
            }
            Outcome::Success(task.display_name())
        };
        let recorder = Recorder::default();

        let errors = BatchExecutor::new(2, Arc::new(transform))
            .execute(tasks(&["a.png", "boom.png", "b.png"]), &recorder)
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("boom.png"));
        assert!(errors[0].contains("decoder exploded"));
        assert_eq!(recorder.0.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_zero_workers_means_one() {
        let executor = BatchExecutor::new(0, Arc::new(succeed));
        assert_eq!(executor.workers(), 1);
        let errors = executor.execute(tasks(&["a.png", "b.png"]), &Recorder::default()).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let recorder = Recorder::default();
        let errors = BatchExecutor::new(4, Arc::new(succeed)).execute(Vec::new(), &recorder).unwrap();
        assert!(errors.is_empty());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_report_counts() {
        let report = BatchReport::new(10, vec!["x".into(), "y".into()], Duration::from_secs(4));
        assert_eq!(report.succeeded, 8);
        assert_eq!(report.failed, 2);
        assert!(!report.is_clean());
        assert_eq!(report.files_per_second(), 2.0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed_secs"], 4.0);
        assert_eq!(json["errors"][1], "y");
    }
}
