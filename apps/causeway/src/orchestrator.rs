use std::sync::Arc;

use isle_sdk::types::{IslandEndpoint, IslandStatus};
use isle_sdk::ControlPlaneApi;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::pending::{PendingConnectionTracker, RunHandle, RunPhase};
use crate::readiness::{ReadinessOutcome, ReadinessStrategy};
use crate::registry::{DynamicBackendRegistry, ProxyRouter};

/// Why a run ended in FAILED. Only this surfaces beyond the state machine;
/// everything below it stays in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("island reported RUNNING without an endpoint")]
    Inconsistent,
    #[error("island is in terminal status {0:?}")]
    IslandError(IslandStatus),
    #[error("island did not become ready within the wait budget")]
    Timeout,
    #[error("control plane failure: {0}")]
    ControlPlane(String),
    #[error("start request rejected: {0}")]
    StartRejected(String),
    #[error("routing connect failed: {0}")]
    ConnectFailed(String),
}

/// States of one orchestration run. CONNECTED and FAILED are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunState {
    Checking,
    Starting,
    Polling,
    Connecting(IslandEndpoint),
    Connected,
    Failed(FailureReason),
}

/// Terminal result of a connect trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Connected,
    Failed(FailureReason),
    /// The player disconnected mid-run; no further side effects were taken.
    Abandoned,
    /// A run for this player was already active; this trigger was a no-op.
    AlreadyPending,
}

/// Drives start → readiness wait → connect for a player's island against the
/// control plane, registering the routing endpoint on success and falling
/// back to a static destination on failure.
#[derive(Clone)]
pub struct IslandOrchestrator {
    control: Arc<dyn ControlPlaneApi>,
    router: Arc<dyn ProxyRouter>,
    registry: DynamicBackendRegistry,
    pending: PendingConnectionTracker,
    readiness: Arc<dyn ReadinessStrategy>,
    fallback_backend: Option<String>,
    freeze_on_disconnect: bool,
}

impl IslandOrchestrator {
    pub fn new(
        control: Arc<dyn ControlPlaneApi>,
        router: Arc<dyn ProxyRouter>,
        registry: DynamicBackendRegistry,
        pending: PendingConnectionTracker,
        readiness: Arc<dyn ReadinessStrategy>,
        fallback_backend: Option<String>,
        freeze_on_disconnect: bool,
    ) -> Self {
        Self {
            control,
            router,
            registry,
            pending,
            readiness,
            fallback_backend,
            freeze_on_disconnect,
        }
    }

    /// Runs a full orchestration for the player. Suppresses the trigger if a
    /// run is already pending; otherwise drives the state machine to a
    /// terminal state, routes the fallback on failure, and clears the
    /// pending entry so a later trigger starts a fresh run.
    pub async fn connect_player(&self, player_id: Uuid) -> RunOutcome {
        let Some(run) = self.pending.try_begin(player_id) else {
            debug!(player = %player_id, "connect trigger ignored; run already pending");
            return RunOutcome::AlreadyPending;
        };

        let outcome = self.drive(&run).await;
        match &outcome {
            RunOutcome::Connected => {
                info!(player = %player_id, "player routed to island");
            }
            RunOutcome::Failed(reason) => {
                warn!(player = %player_id, reason = %reason, "island connect failed");
                self.route_fallback(player_id).await;
            }
            RunOutcome::Abandoned => {
                debug!(player = %player_id, "run abandoned after disconnect");
            }
            // drive never yields AlreadyPending; the slot was claimed above.
            RunOutcome::AlreadyPending => {}
        }
        self.pending.end(player_id);
        outcome
    }

    /// Fire-and-return variant for trigger call sites that must not block.
    pub fn spawn_connect(&self, player_id: Uuid) -> JoinHandle<RunOutcome> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.connect_player(player_id).await })
    }

    /// Player disconnect: abandon any active run, withdraw the routing
    /// endpoint, and ask the control plane to stop (or freeze) the island.
    /// The stop/freeze is fire-and-forget; losing it wastes resources but
    /// loses no data.
    pub async fn disconnect_player(&self, player_id: Uuid) {
        self.pending.cancel(player_id);
        if let Err(err) = self.registry.unregister(player_id).await {
            warn!(player = %player_id, error = %err, "failed to unregister backend at disconnect");
        }
        let result = if self.freeze_on_disconnect {
            self.control.request_freeze(player_id).await
        } else {
            self.control.request_stop(player_id).await
        };
        if let Err(err) = result {
            warn!(player = %player_id, error = %err, "island stop/freeze request lost");
        }
    }

    async fn drive(&self, run: &RunHandle) -> RunOutcome {
        let player_id = run.player_id();
        let mut state = RunState::Checking;
        loop {
            if run.is_cancelled() {
                return RunOutcome::Abandoned;
            }
            state = match state {
                RunState::Checking => {
                    run.set_phase(RunPhase::Checking);
                    self.step_checking(player_id).await
                }
                RunState::Starting => {
                    run.set_phase(RunPhase::Starting);
                    self.step_starting(player_id).await
                }
                RunState::Polling => {
                    run.set_phase(RunPhase::Polling);
                    match self.readiness.await_ready(run).await {
                        ReadinessOutcome::Ready(endpoint) => RunState::Connecting(endpoint),
                        ReadinessOutcome::Cancelled => return RunOutcome::Abandoned,
                        ReadinessOutcome::IslandError(status) => {
                            RunState::Failed(FailureReason::IslandError(status))
                        }
                        ReadinessOutcome::Inconsistent => {
                            error!(player = %player_id, "island RUNNING without endpoint during wait");
                            RunState::Failed(FailureReason::Inconsistent)
                        }
                        ReadinessOutcome::TimedOut => RunState::Failed(FailureReason::Timeout),
                        ReadinessOutcome::Fatal(message) => {
                            RunState::Failed(FailureReason::ControlPlane(message))
                        }
                    }
                }
                RunState::Connecting(endpoint) => {
                    run.set_phase(RunPhase::Connecting);
                    self.step_connecting(player_id, endpoint).await
                }
                RunState::Connected => return RunOutcome::Connected,
                RunState::Failed(reason) => return RunOutcome::Failed(reason),
            };
        }
    }

    async fn step_checking(&self, player_id: Uuid) -> RunState {
        match self.control.island_details(player_id).await {
            Ok(Some(details)) if details.status == IslandStatus::Running => {
                match details.endpoint() {
                    Some(endpoint) => RunState::Connecting(endpoint),
                    None => {
                        // Control-plane bug, not a transient condition;
                        // retrying cannot repair missing backend data.
                        error!(player = %player_id, "island RUNNING without endpoint");
                        RunState::Failed(FailureReason::Inconsistent)
                    }
                }
            }
            // Stopped, frozen, queued, pending, errored, or no island at
            // all: ask the control plane to (re)start it.
            Ok(_) => RunState::Starting,
            Err(err) => {
                warn!(player = %player_id, error = %err, "island details lookup failed");
                RunState::Failed(FailureReason::ControlPlane(err.to_string()))
            }
        }
    }

    async fn step_starting(&self, player_id: Uuid) -> RunState {
        // The client already folds 409 (already starting/running) into Ok.
        match self.control.request_start(player_id).await {
            Ok(()) => {
                debug!(player = %player_id, "island start requested");
                RunState::Polling
            }
            Err(err) => {
                warn!(player = %player_id, error = %err, "island start request rejected");
                RunState::Failed(FailureReason::StartRejected(err.to_string()))
            }
        }
    }

    async fn step_connecting(&self, player_id: Uuid, endpoint: IslandEndpoint) -> RunState {
        let name = match self
            .registry
            .register(player_id, &endpoint.host, endpoint.port)
            .await
        {
            Ok(name) => name,
            Err(err) => {
                warn!(player = %player_id, error = %err, "backend registration failed");
                return RunState::Failed(FailureReason::ConnectFailed(err.to_string()));
            }
        };
        match self.router.connect_player(player_id, &name).await {
            Ok(()) => RunState::Connected,
            Err(err) => {
                warn!(player = %player_id, backend = %name, error = %err, "connect failed; withdrawing backend");
                if let Err(err) = self.registry.unregister(player_id).await {
                    warn!(player = %player_id, error = %err, "failed to withdraw backend");
                }
                RunState::Failed(FailureReason::ConnectFailed(err.to_string()))
            }
        }
    }

    async fn route_fallback(&self, player_id: Uuid) {
        let Some(fallback) = &self.fallback_backend else {
            debug!(player = %player_id, "no fallback backend configured");
            return;
        };
        match self.router.connect_player(player_id, fallback).await {
            Ok(()) => info!(player = %player_id, backend = %fallback, "player routed to fallback"),
            Err(err) => {
                warn!(player = %player_id, backend = %fallback, error = %err, "fallback routing failed")
            }
        }
    }
}
