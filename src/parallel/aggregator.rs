//! Collects task outcomes as they complete

use tracing::debug;

use crate::parallel::progress::{display_label, ProgressSink};
use crate::processing::Outcome;

/// Running tally of outcomes, in completion order
#[derive(Debug, Default)]
pub struct OutcomeAggregator {
    collected: usize,
    errors: Vec<String>,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one outcome and emit its progress update
    pub fn record(&mut self, outcome: Outcome, progress: &dyn ProgressSink) {
        progress.advance(&display_label(&outcome.to_string()));
        self.collected += 1;

        match outcome {
            Outcome::Success(name) => debug!("Completed {}", name),
            Outcome::Failure(reason) => {
                debug!("Failed: {}", reason);
                self.errors.push(reason);
            }
        }
    }

    /// Outcomes seen so far
    pub fn collected(&self) -> usize {
        self.collected
    }

    /// Failure reasons, without the progress marker
    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }
}
