//! Reactive trigger loop.
//!
//! Watches the task store for inserts and drives the assignment pipeline:
//! - In-process signals from the ingestion endpoint wake the loop immediately
//! - A persistent-cursor poll catches writers that bypass this process
//! - Signals arriving mid-run coalesce into exactly one follow-up run
//! - Snapshot failures retry with exponential backoff without killing the loop
//!
//! The coalescing state machine guarantees at most one pipeline execution in
//! flight, which keeps the one-active-task-per-worker invariant enforceable
//! without cross-run locking.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::store::TaskStore;

use super::{EngineError, RunSummary};

/// First retry delay after a failed run.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Retry delay ceiling.
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// The assignment pipeline as seen by the trigger loop.
#[async_trait]
pub trait Pipeline: Send + Sync + 'static {
    async fn run(&self) -> Result<RunSummary, EngineError>;
}

/// Execution state of the trigger loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    PendingRerun,
}

struct Shared {
    state: Mutex<RunState>,
    wake: Notify,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        // Poisoning only means a panic elsewhere; the state value stays valid.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn signal(&self) {
        let mut state = self.lock_state();
        match *state {
            RunState::Idle => {
                *state = RunState::Running;
                drop(state);
                self.wake.notify_one();
            }
            RunState::Running => *state = RunState::PendingRerun,
            RunState::PendingRerun => {}
        }
    }
}

/// Cheap handle for signalling task inserts to the loop.
#[derive(Clone)]
pub struct TriggerHandle {
    shared: Arc<Shared>,
}

impl TriggerHandle {
    /// Report a task insert. Idle loops start a run; busy loops schedule
    /// exactly one rerun no matter how many signals arrive.
    pub fn signal_insert(&self) {
        self.shared.signal();
    }
}

/// The trigger loop itself; run it on a spawned task.
pub struct TriggerLoop<P> {
    pipeline: Arc<P>,
    store: Arc<TaskStore>,
    shared: Arc<Shared>,
    poll_interval: Duration,
}

impl<P: Pipeline> TriggerLoop<P> {
    pub fn new(
        pipeline: Arc<P>,
        store: Arc<TaskStore>,
        poll_interval: Duration,
    ) -> (Self, TriggerHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(RunState::Idle),
            wake: Notify::new(),
        });
        let handle = TriggerHandle {
            shared: Arc::clone(&shared),
        };
        (
            Self {
                pipeline,
                store,
                shared,
                poll_interval,
            },
            handle,
        )
    }

    pub async fn run(self) {
        let mut backoff = BACKOFF_BASE;
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            while *self.shared.lock_state() != RunState::Running {
                tokio::select! {
                    _ = self.shared.wake.notified() => {}
                    _ = poll.tick() => self.poll_for_inserts().await,
                }
            }

            match self.pipeline.run().await {
                Ok(summary) => {
                    backoff = BACKOFF_BASE;
                    info!(
                        tasks = summary.tasks,
                        workers = summary.workers,
                        committed = summary.committed,
                        conflicts = summary.conflicts,
                        unassigned = summary.unassigned,
                        generations = summary.generations,
                        "assignment run complete"
                    );
                    let mut state = self.shared.lock_state();
                    *state = match *state {
                        // Inserts arrived mid-run; cover them immediately.
                        RunState::PendingRerun => RunState::Running,
                        _ => RunState::Idle,
                    };
                }
                Err(err) => {
                    warn!(error = %err, delay_ms = backoff.as_millis() as u64, "run failed, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                    // Retry the run, folding any pending signal into it.
                    *self.shared.lock_state() = RunState::Running;
                }
            }
        }
    }

    /// Polling fallback over the persistent cursor, for inserts written by
    /// other processes that never call `signal_insert`.
    async fn poll_for_inserts(&self) {
        let newest = match self.store.last_task_seq().await {
            Ok(seq) => seq,
            Err(err) => {
                warn!(error = %err, "insert poll failed");
                return;
            }
        };
        let cursor = match self.store.cursor().await {
            Ok(cursor) => cursor,
            Err(err) => {
                warn!(error = %err, "cursor read failed");
                return;
            }
        };
        if newest > cursor {
            debug!(newest, cursor, "poll found unseen inserts");
            self.shared.signal();
        }
    }
}
