//! Progress reporting for planning and execution
//!
//! Producers only enqueue events. A single renderer thread owns the
//! terminal bar and drains the queue, so a slow terminal never holds up
//! outcome collection.

use std::thread::{self, JoinHandle};
use console::Alignment;
use crossbeam::channel::{self, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::error::{Result, ResampleError};

/// Terminal columns reserved for the label of each update
pub const LABEL_WIDTH: usize = 24;

/// Fit text into the label column: single line, truncated or padded
pub fn display_label(text: &str) -> String {
    let single_line: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    console::pad_str(&single_line, LABEL_WIDTH, Alignment::Left, Some("")).into_owned()
}

/// Receiver of progress updates; every call counts as one unit of progress
pub trait ProgressSink: Send + Sync {
    fn advance(&self, label: &str);
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _label: &str) {}
}

/// Progress update event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Advance { label: String },
}

/// Channel-backed sink with a dedicated renderer thread
pub struct ProgressReporter {
    sender: Sender<ProgressEvent>,
    renderer: JoinHandle<u64>,
}

impl ProgressReporter {
    /// Start a renderer for `total` updates. A hidden reporter keeps the
    /// accounting but draws nothing.
    pub fn spawn(total: u64, title: &str, visible: bool) -> Result<Self> {
        let bar = if visible {
            create_progress_bar(total, title)
        } else {
            ProgressBar::hidden()
        };

        let (sender, receiver) = channel::unbounded();
        let renderer = thread::Builder::new()
            .name(format!("progress-{}", title))
            .spawn(move || render(&bar, &receiver))?;

        Ok(Self { sender, renderer })
    }

    /// Stop accepting updates, wait for the renderer to drain the queue and
    /// return how many updates it rendered.
    pub fn finish(self) -> Result<u64> {
        let Self { sender, renderer } = self;
        drop(sender);
        renderer
            .join()
            .map_err(|_| ResampleError::parallel("progress renderer panicked"))
    }
}

impl ProgressSink for ProgressReporter {
    fn advance(&self, label: &str) {
        // Fails only if the renderer is gone, and then there is nothing to draw on
        let _ = self.sender.send(ProgressEvent::Advance {
            label: label.to_string(),
        });
    }
}

fn render(bar: &ProgressBar, events: &Receiver<ProgressEvent>) -> u64 {
    let mut rendered = 0;
    for event in events {
        match event {
            ProgressEvent::Advance { label } => {
                bar.set_message(label);
                bar.inc(1);
                rendered += 1;
            }
        }
    }
    bar.finish();
    debug!("Progress renderer finished after {} updates", rendered);
    rendered
}

/// Create the standard bar used for both phases
pub fn create_progress_bar(len: u64, title: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} {msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb.set_prefix(title.to_string());
    pb
}
