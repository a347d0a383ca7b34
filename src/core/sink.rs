//! Progress and result delivery
//!
//! The controller pushes updates into a [`ProgressSink`]; the exportable rows
//! are pulled on demand through [`crate::BatchController::export_rows`].

use serde::Serialize;

use crate::core::controller::RunState;
use crate::core::pairs::{PairTask, TravelTime};

/// Consumer of batch progress
///
/// Callbacks run on the drive loop; implementations should return quickly.
pub trait ProgressSink: Send + Sync {
    /// A task was resolved successfully
    fn on_task_resolved(&self, _task: &PairTask) {}

    /// `completed` of `total` tasks have been attempted
    fn on_progress(&self, _completed: usize, _total: usize) {}

    /// The drive loop exited in `state` (`Completed` or `Stopped`)
    fn on_batch_finished(&self, _state: RunState) {}
}

/// Sink that ignores every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {}

/// One line of the export document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub from_name: String,
    pub to_name: String,
    pub distance_km: f64,
    pub duration: TravelTime,
}

impl ExportRow {
    /// Build a row from a resolved task; pending tasks have no row
    pub fn from_task(task: &PairTask) -> Option<Self> {
        if !task.is_done() {
            return None;
        }
        Some(Self {
            from_name: task.from.name.clone(),
            to_name: task.to.name.clone(),
            distance_km: task.distance?,
            duration: task.duration,
        })
    }
}

/// Exportable subset of `tasks`: resolved ones only, in id order
pub fn exportable_rows(tasks: &[PairTask]) -> Vec<ExportRow> {
    tasks.iter().filter_map(ExportRow::from_task).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pairs::{generate, Node};

    #[test]
    fn test_exportable_rows_skip_pending() {
        let nodes = vec![
            Node::new("A", 0.0, 0.0),
            Node::new("B", 0.0, 1.0),
            Node::new("C", 1.0, 0.0),
        ];
        let mut tasks = generate(&nodes);
        tasks[1].resolve(2.5, TravelTime::Minutes(4.0));
        tasks[4].resolve(7.25, TravelTime::Unknown);

        let rows = exportable_rows(&tasks);
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].from_name.as_str(), rows[0].to_name.as_str()), ("A", "C"));
        assert_eq!(rows[0].distance_km, 2.5);
        assert_eq!((rows[1].from_name.as_str(), rows[1].to_name.as_str()), ("C", "A"));
        assert_eq!(rows[1].duration, TravelTime::Unknown);
    }

    #[test]
    fn test_exportable_rows_empty_when_nothing_resolved() {
        let tasks = generate(&[Node::new("A", 0.0, 0.0), Node::new("B", 1.0, 1.0)]);
        assert!(exportable_rows(&tasks).is_empty());
    }
}
