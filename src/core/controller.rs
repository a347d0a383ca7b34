//! Batch execution controller
//!
//! Owns the pair-task queue for one loaded node set and drives it through a
//! [`DistanceProvider`] one task at a time:
//!
//! ```text
//! Idle ──start──▶ Running ──pause──▶ Paused
//!                  ▲   │ ◀──start────┘  │
//!                  │   └──stop──▶ Stopped ◀─stop─┘
//!                  └──start (resume from checkpoint)
//! Running ──queue exhausted──▶ Completed
//! ```
//!
//! Pause and stop are cooperative. An in-flight provider call is always
//! awaited; the run state is checked between tasks and during the inter-call
//! delay. The run state lives in a `watch` channel so a suspended drive loop
//! wakes on the next transition instead of polling.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::core::config::{ProviderConfig, RetryPolicy};
use crate::core::error::{ProviderError, Result};
use crate::core::http::retry_transient;
use crate::core::pairs::{generate, Node, PairTask};
use crate::core::provider::{Credential, DistanceProvider, Resolution};
use crate::core::sink::{exportable_rows, ExportRow, ProgressSink};

/// Phase of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

impl RunState {
    /// No drive loop will continue from this state on its own
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Stopped | RunState::Completed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopped => "stopped",
            RunState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// What a call to [`BatchController::start`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new drive loop was spawned from the checkpoint
    Started,
    /// A paused loop was woken up
    Resumed,
    /// A loop is already running; nothing changed
    AlreadyRunning,
    /// Every task has been attempted; load a new node set to run again
    AlreadyCompleted,
}

/// Per-call execution limits applied by the drive loop
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Upper bound on each provider attempt; a retry gets a fresh bound
    pub call_timeout: Duration,

    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for BatchOptions {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            call_timeout: config.request_timeout,
            retry: config.retry.clone(),
        }
    }
}

/// Point-in-time copy of a batch
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub tasks: Vec<PairTask>,
    /// Index of the next task to attempt
    pub checkpoint: usize,
    pub run: RunState,
}

impl BatchSnapshot {
    pub fn done_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_done()).count()
    }
}

struct Queue {
    tasks: Vec<PairTask>,
    checkpoint: usize,
}

/// State of one loaded node set
struct Batch {
    queue: Mutex<Queue>,
    run: watch::Sender<RunState>,
    /// True while a drive loop exists for this batch
    active: watch::Sender<bool>,
}

impl Batch {
    fn new(tasks: Vec<PairTask>) -> Self {
        Self {
            queue: Mutex::new(Queue {
                tasks,
                checkpoint: 0,
            }),
            run: watch::Sender::new(RunState::Idle),
            active: watch::Sender::new(false),
        }
    }

    fn run_state(&self) -> RunState {
        *self.run.borrow()
    }

    /// Move from one of `from` to `to`; returns whether the transition happened
    fn transition(&self, from: &[RunState], to: RunState) -> bool {
        self.run.send_if_modified(|state| {
            if from.contains(state) {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Wait until no drive loop is left for this batch
    async fn wait_inactive(&self) {
        let mut active = self.active.subscribe();
        wait_until(&mut active, |running| !running).await;
    }
}

/// Wait for a watch value matching `accept`, returning it
///
/// A closed channel yields the last value seen.
async fn wait_until<T, F>(rx: &mut watch::Receiver<T>, accept: F) -> T
where
    T: Copy,
    F: Fn(T) -> bool,
{
    loop {
        let current = *rx.borrow_and_update();
        if accept(current) || rx.changed().await.is_err() {
            return current;
        }
    }
}

/// Clears the active flag when the drive loop exits, panics included
struct ActiveGuard(Arc<Batch>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.send_replace(false);
    }
}

/// Cooperative controller for a batch of pairwise distance lookups
///
/// Share it behind an `Arc`: `pause` and `stop` can be called from any task
/// while another awaits [`BatchController::wait`].
pub struct BatchController {
    batch: RwLock<Arc<Batch>>,
    sink: Arc<dyn ProgressSink>,
    options: BatchOptions,
    /// Serialises start and load so that a batch never gets two drive loops
    lifecycle: tokio::sync::Mutex<()>,
}

impl BatchController {
    /// Create a controller with an empty batch
    pub fn new(sink: Arc<dyn ProgressSink>, options: BatchOptions) -> Self {
        Self {
            batch: RwLock::new(Arc::new(Batch::new(Vec::new()))),
            sink,
            options,
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    fn current(&self) -> Arc<Batch> {
        self.batch.read().clone()
    }

    /// Replace the batch with every ordered pair of `nodes`
    ///
    /// A running or paused batch is stopped first and its drive loop is
    /// awaited, so no work for the discarded batch outlives this call.
    /// Returns the number of tasks in the new batch.
    pub async fn load(&self, nodes: &[Node]) -> usize {
        let _lifecycle = self.lifecycle.lock().await;

        let previous = self.current();
        if previous.transition(&[RunState::Running, RunState::Paused], RunState::Stopped) {
            info!("⏹️  Stopping current batch before loading a new node set");
        }
        previous.wait_inactive().await;

        let tasks = generate(nodes);
        let total = tasks.len();
        *self.batch.write() = Arc::new(Batch::new(tasks));

        info!("📋 Loaded {} nodes into {} pair tasks", nodes.len(), total);
        total
    }

    /// Start, resume, or continue a stopped batch
    ///
    /// From `Idle` or `Stopped` a drive loop is spawned at the checkpoint.
    /// From `Paused` the suspended loop is woken and keeps the provider it
    /// was started with. Provider preconditions are checked before anything
    /// changes; a validation error leaves the run state untouched.
    pub async fn start(
        &self,
        provider: Arc<dyn DistanceProvider>,
        credential: Option<Credential>,
    ) -> Result<StartOutcome> {
        let _lifecycle = self.lifecycle.lock().await;
        let batch = self.current();

        match batch.run_state() {
            RunState::Running => return Ok(StartOutcome::AlreadyRunning),
            RunState::Completed => return Ok(StartOutcome::AlreadyCompleted),
            _ => {}
        }

        provider.validate(credential.as_ref())?;

        // A paused loop is always alive: it only exits on Stopped or Completed
        if batch.transition(&[RunState::Paused], RunState::Running) {
            info!("▶️  Batch resumed");
            return Ok(StartOutcome::Resumed);
        }

        // A stopped loop may still be finishing its in-flight call
        batch.wait_inactive().await;

        batch.active.send_replace(true);
        batch.run.send_replace(RunState::Running);

        let (checkpoint, total) = {
            let queue = batch.queue.lock();
            (queue.checkpoint, queue.tasks.len())
        };
        info!(
            "▶️  Batch started with '{}' at task {checkpoint} of {total}",
            provider.name()
        );

        let driver = Driver {
            batch: Arc::clone(&batch),
            provider,
            credential,
            sink: Arc::clone(&self.sink),
            options: self.options.clone(),
        };
        tokio::spawn(driver.run());

        Ok(StartOutcome::Started)
    }

    /// Suspend a running batch before its next task
    ///
    /// The in-flight call, if any, completes and is recorded. Returns whether
    /// the batch was running.
    pub fn pause(&self) -> bool {
        let paused = self
            .current()
            .transition(&[RunState::Running], RunState::Paused);
        if paused {
            info!("⏸️  Batch paused");
        }
        paused
    }

    /// Stop a running or paused batch; the checkpoint is kept
    ///
    /// Returns whether the batch was running or paused.
    pub fn stop(&self) -> bool {
        let stopped = self
            .current()
            .transition(&[RunState::Running, RunState::Paused], RunState::Stopped);
        if stopped {
            info!("⏹️  Batch stop requested");
        }
        stopped
    }

    /// Wait until the drive loop has exited, returning the final run state
    ///
    /// Returns at once when no loop exists. A paused batch keeps its loop
    /// alive, so this only returns once it is resumed or stopped.
    pub async fn wait(&self) -> RunState {
        let batch = self.current();
        batch.wait_inactive().await;
        batch.run_state()
    }

    pub fn run_state(&self) -> RunState {
        self.current().run_state()
    }

    /// Index of the next task to attempt
    pub fn checkpoint(&self) -> usize {
        self.current().queue.lock().checkpoint
    }

    pub fn total(&self) -> usize {
        self.current().queue.lock().tasks.len()
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        let batch = self.current();
        let run = batch.run_state();
        let queue = batch.queue.lock();
        BatchSnapshot {
            tasks: queue.tasks.clone(),
            checkpoint: queue.checkpoint,
            run,
        }
    }

    /// Resolved tasks as export rows, in id order
    pub fn export_rows(&self) -> Vec<ExportRow> {
        exportable_rows(&self.current().queue.lock().tasks)
    }

    /// Export is available once at least one task is resolved
    pub fn can_export(&self) -> bool {
        self.current().queue.lock().tasks.iter().any(|t| t.is_done())
    }
}

/// One drive loop over a batch
struct Driver {
    batch: Arc<Batch>,
    provider: Arc<dyn DistanceProvider>,
    credential: Option<Credential>,
    sink: Arc<dyn ProgressSink>,
    options: BatchOptions,
}

impl Driver {
    async fn run(self) {
        let _active = ActiveGuard(Arc::clone(&self.batch));
        let final_state = self.drive().await;
        self.sink.on_batch_finished(final_state);
    }

    async fn drive(&self) -> RunState {
        let mut run_rx = self.batch.run.subscribe();
        let delay = self.provider.call_delay();
        let (start, total) = {
            let queue = self.batch.queue.lock();
            (queue.checkpoint, queue.tasks.len())
        };

        for index in start..total {
            // Suspend while paused; leave on stop without touching the task
            let state = wait_until(&mut run_rx, |s| s != RunState::Paused).await;
            if state == RunState::Stopped {
                self.batch.queue.lock().checkpoint = index;
                info!("⏹️  Batch stopped at task {index} of {total}");
                return RunState::Stopped;
            }

            let task = {
                let mut queue = self.batch.queue.lock();
                queue.checkpoint = index;
                queue.tasks[index].clone()
            };

            if task.is_done() {
                debug!("Task {index} already resolved, skipping");
                self.sink.on_progress(index + 1, total);
                continue;
            }

            match self.resolve(&task).await {
                Ok(resolution) => {
                    let resolved = {
                        let mut queue = self.batch.queue.lock();
                        let slot = &mut queue.tasks[index];
                        slot.resolve(resolution.distance_km, resolution.duration);
                        slot.clone()
                    };
                    debug!(
                        "Task {index} {} → {}: {} km",
                        resolved.from.name, resolved.to.name, resolution.distance_km
                    );
                    self.sink.on_task_resolved(&resolved);
                }
                Err(e) => {
                    warn!(
                        "⚠️  Task {index} ({} → {}) failed: {e}",
                        task.from.name, task.to.name
                    );
                }
            }
            self.sink.on_progress(index + 1, total);

            // The task just attempted is where a stop issued mid-call lands
            if self.batch.run_state() == RunState::Stopped {
                info!("⏹️  Batch stopped after task {index} of {total}");
                return RunState::Stopped;
            }

            if index + 1 < total && !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = wait_until(&mut run_rx, |s| s == RunState::Stopped) => {}
                }
            }
        }

        self.batch.queue.lock().checkpoint = total;
        self.batch.transition(
            &[RunState::Running, RunState::Paused],
            RunState::Completed,
        );
        info!("✅ Batch completed: {total} tasks attempted");
        RunState::Completed
    }

    /// Resolve with retries; each attempt is time-bounded and expiry counts as a provider failure
    ///
    /// A stop abandons the remaining retries: the backoff is cut short and no
    /// further request is sent for the task.
    async fn resolve(&self, task: &PairTask) -> std::result::Result<Resolution, ProviderError> {
        let bound = self.options.call_timeout;
        let mut run_rx = self.batch.run.subscribe();
        let stopped = async move {
            wait_until(&mut run_rx, |s| s == RunState::Stopped).await;
        };

        retry_transient(
            &self.options.retry,
            || async {
                match tokio::time::timeout(bound, self.provider.resolve(task, self.credential.as_ref())).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(bound)),
                }
            },
            stopped,
        )
        .await
    }
}
