//! CLI-specific progress handling for butterfly-pairs
//!
//! Renders batch progress as a terminal progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use butterfly_pairs::{PairTask, ProgressSink, RunState};

/// Creates a progress bar counting attempted pairs
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} pairs ({percent}%) ETA: {eta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    );
    pb
}

/// Progress sink drawing a progress bar on stderr
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total: u64, message: &str) -> Self {
        let pb = create_progress_bar(total);

        // Print initial message to stderr
        eprintln!("{}", message);

        Self {
            pb,
        }
    }
}

impl ProgressSink for ProgressManager {
    fn on_task_resolved(&self, task: &PairTask) {
        let time = task
            .duration
            .minutes()
            .map_or_else(|| "time unknown".to_string(), |m| format!("{m:.1} min"));
        let distance = task.distance.unwrap_or_default();
        self.pb.set_message(format!("{} → {}: {distance:.2} km, {time}", task.from.name, task.to.name));
        info!("{} → {}: {distance:.2} km, {time}", task.from.name, task.to.name);
    }

    fn on_progress(&self, completed: usize, total: usize) {
        if self.pb.length().unwrap_or(0) != total as u64 {
            self.pb.set_length(total as u64);
        }
        self.pb.set_position(completed as u64);
    }

    fn on_batch_finished(&self, state: RunState) {
        match state {
            RunState::Completed => self.pb.finish_with_message("✅ All pairs attempted"),
            _ => self.pb.abandon_with_message(format!("⏹️  Batch {state}")),
        }
    }
}
