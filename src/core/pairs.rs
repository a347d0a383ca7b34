//! Node and pair-task model
//!
//! A batch is the full set of directed node pairs, each one a [`PairTask`]
//! that starts unresolved and is filled in by a distance provider.

use serde::Serialize;

/// A named geographic point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Node {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
        }
    }
}

/// Travel time of a resolved task
///
/// `Unknown` is reported by providers whose response carries no duration and
/// must not be confused with zero minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TravelTime {
    Unresolved,
    Minutes(f64),
    Unknown,
}

impl TravelTime {
    pub fn minutes(&self) -> Option<f64> {
        match self {
            TravelTime::Minutes(m) => Some(*m),
            _ => None,
        }
    }
}

/// Resolution state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Pending,
    Done,
}

/// One directed node pair awaiting or holding a distance/duration result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairTask {
    pub id: usize,
    pub from: Node,
    pub to: Node,
    /// Distance in kilometres, `None` until a lookup succeeds
    pub distance: Option<f64>,
    pub duration: TravelTime,
    pub status: TaskStatus,
}

impl PairTask {
    fn pending(id: usize, from: &Node, to: &Node) -> Self {
        Self {
            id,
            from: from.clone(),
            to: to.clone(),
            distance: None,
            duration: TravelTime::Unresolved,
            status: TaskStatus::Pending,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Record a successful lookup; a resolved task never reverts to pending
    pub(crate) fn resolve(&mut self, distance_km: f64, duration: TravelTime) {
        self.distance = Some(distance_km);
        self.duration = duration;
        self.status = TaskStatus::Done;
    }
}

/// Expand nodes into every ordered pair `(i, j)` with `i != j`
///
/// Row-major: `i` outer, `j` inner ascending. Ids follow emission order, so
/// `n` nodes always give `n * (n - 1)` tasks numbered from zero.
pub fn generate(nodes: &[Node]) -> Vec<PairTask> {
    let n = nodes.len();
    let mut tasks = Vec::with_capacity(n * n.saturating_sub(1));

    for (i, from) in nodes.iter().enumerate() {
        for (j, to) in nodes.iter().enumerate() {
            if i == j {
                continue;
            }
            tasks.push(PairTask::pending(tasks.len(), from, to));
        }
    }

    tasks
}
