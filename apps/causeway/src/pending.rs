use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Phase an active orchestration run is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Checking,
    Starting,
    Polling,
    Connecting,
}

#[derive(Debug)]
struct PendingConnection {
    phase: RunPhase,
    attempt: u32,
    started_at: Instant,
    cancel: CancellationToken,
}

/// Tracks players with an active orchestration run so two simultaneous
/// triggers for the same player never start two runs. Entries are transient:
/// created when a run begins, removed when it reaches a terminal state.
#[derive(Clone, Default)]
pub struct PendingConnectionTracker {
    runs: Arc<DashMap<Uuid, PendingConnection>>,
}

impl PendingConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims a run slot for the player. Returns `None` when a run
    /// is already pending; the entry API makes the test-and-insert a single
    /// map operation, so two concurrent callers cannot both claim it.
    pub fn try_begin(&self, player_id: Uuid) -> Option<RunHandle> {
        match self.runs.entry(player_id) {
            dashmap::Entry::Occupied(_) => None,
            dashmap::Entry::Vacant(slot) => {
                let cancel = CancellationToken::new();
                slot.insert(PendingConnection {
                    phase: RunPhase::Checking,
                    attempt: 0,
                    started_at: Instant::now(),
                    cancel: cancel.clone(),
                });
                Some(RunHandle {
                    player_id,
                    tracker: self.clone(),
                    cancel,
                })
            }
        }
    }

    /// Removes the run entry unconditionally (terminal state or abandoned).
    pub fn end(&self, player_id: Uuid) {
        self.runs.remove(&player_id);
    }

    /// Cancels an active run if one exists. The run observes the token
    /// between transitions and abandons itself; the entry is cleared by the
    /// run, not here.
    pub fn cancel(&self, player_id: Uuid) {
        if let Some(run) = self.runs.get(&player_id) {
            run.cancel.cancel();
        }
    }

    pub fn is_pending(&self, player_id: Uuid) -> bool {
        self.runs.contains_key(&player_id)
    }

    pub fn phase(&self, player_id: Uuid) -> Option<RunPhase> {
        self.runs.get(&player_id).map(|run| run.phase)
    }

    pub fn run_age(&self, player_id: Uuid) -> Option<std::time::Duration> {
        self.runs.get(&player_id).map(|run| run.started_at.elapsed())
    }
}

/// Claimed run slot handed to the orchestrator. Keeps the tracker entry's
/// phase and attempt counter current and carries the run's cancel token.
#[derive(Clone)]
pub struct RunHandle {
    player_id: Uuid,
    tracker: PendingConnectionTracker,
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn set_phase(&self, phase: RunPhase) {
        if let Some(mut run) = self.tracker.runs.get_mut(&self.player_id) {
            run.phase = phase;
        }
    }

    pub fn set_attempt(&self, attempt: u32) {
        if let Some(mut run) = self.tracker.runs.get_mut(&self.player_id) {
            run.attempt = attempt;
        }
    }
}
