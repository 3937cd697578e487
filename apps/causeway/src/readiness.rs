use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use isle_sdk::types::{IslandDetails, IslandEndpoint, IslandStatus};
use isle_sdk::{ControlPlaneApi, ControlPlaneError};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::pending::RunHandle;

/// Terminal result of waiting for an island to become ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    Ready(IslandEndpoint),
    /// The island landed in a terminal error status.
    IslandError(IslandStatus),
    /// RUNNING was reported without an endpoint; a control-plane bug, not a
    /// condition more waiting can fix.
    Inconsistent,
    /// The wait budget was exhausted without the island coming up.
    TimedOut,
    /// The run was abandoned (player disconnected).
    Cancelled,
    /// Non-retryable protocol or data failure from the control plane.
    Fatal(String),
}

/// Strategy for detecting island readiness after a start request. Poll and
/// push variants are interchangeable; both honor the same overall wait
/// ceiling and the same terminal transitions.
#[async_trait]
pub trait ReadinessStrategy: Send + Sync {
    async fn await_ready(&self, run: &RunHandle) -> ReadinessOutcome;
}

/// Classifies one island-details observation. `None` means "keep waiting".
fn classify(details: &IslandDetails, require_ready_flag: bool) -> Option<ReadinessOutcome> {
    if details.status.is_error() {
        return Some(ReadinessOutcome::IslandError(details.status));
    }
    if details.status != IslandStatus::Running {
        return None;
    }
    if require_ready_flag && details.minecraft_ready != Some(true) {
        return None;
    }
    match details.endpoint() {
        Some(endpoint) => Some(ReadinessOutcome::Ready(endpoint)),
        None => Some(ReadinessOutcome::Inconsistent),
    }
}

/// Active polling: re-fetch island details on a fixed interval, up to a
/// bounded attempt count. Transport failures consume an attempt and keep
/// polling; anything non-retryable ends the wait.
pub struct PollingReadiness {
    control: Arc<dyn ControlPlaneApi>,
    interval: Duration,
    max_attempts: u32,
}

impl PollingReadiness {
    pub fn new(control: Arc<dyn ControlPlaneApi>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            control,
            interval,
            max_attempts,
        }
    }
}

#[async_trait]
impl ReadinessStrategy for PollingReadiness {
    async fn await_ready(&self, run: &RunHandle) -> ReadinessOutcome {
        let player_id = run.player_id();
        // Wall-clock ceiling for the whole phase, independent of per-call
        // timeouts inside the client.
        let deadline = tokio::time::Instant::now() + self.interval * self.max_attempts;

        for attempt in 1..=self.max_attempts {
            if run.is_cancelled() {
                return ReadinessOutcome::Cancelled;
            }
            run.set_attempt(attempt);

            match self.control.island_details(player_id).await {
                Ok(Some(details)) => {
                    if let Some(outcome) = classify(&details, false) {
                        return outcome;
                    }
                    debug!(player = %player_id, attempt, status = ?details.status, "island not ready yet");
                }
                Ok(None) => {
                    debug!(player = %player_id, attempt, "island not found yet");
                }
                Err(ControlPlaneError::Transport(err)) => {
                    // Retryable only here, within the attempt budget.
                    warn!(player = %player_id, attempt, error = %err, "poll failed; will retry");
                }
                Err(err) => return ReadinessOutcome::Fatal(err.to_string()),
            }

            if attempt == self.max_attempts || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::select! {
                _ = run.cancel_token().cancelled() => return ReadinessOutcome::Cancelled,
                _ = tokio::time::sleep_until(
                    (tokio::time::Instant::now() + self.interval).min(deadline),
                ) => {}
            }
        }
        ReadinessOutcome::TimedOut
    }
}

/// Push-based readiness: a per-player socket streams JSON frames shaped like
/// the island-details response; a frame with `status == RUNNING` and
/// `minecraft_ready == true` is the terminal signal.
pub struct PushReadiness {
    ws_base: String,
    max_wait: Duration,
}

impl PushReadiness {
    pub fn new(ws_base: impl Into<String>, max_wait: Duration) -> Self {
        let mut ws_base = ws_base.into();
        while ws_base.ends_with('/') {
            ws_base.pop();
        }
        Self { ws_base, max_wait }
    }

    async fn watch(&self, run: &RunHandle) -> ReadinessOutcome {
        let player_id = run.player_id();
        let url = format!("{}/ws/islands/{}", self.ws_base, player_id);
        let (mut stream, _) = match connect_async(url.as_str()).await {
            Ok(conn) => conn,
            Err(err) => {
                return ReadinessOutcome::Fatal(format!("readiness channel connect failed: {err}"))
            }
        };

        let mut attempt = 0u32;
        while let Some(message) = stream.next().await {
            let frame = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    warn!(player = %player_id, error = %err, "readiness channel error");
                    break;
                }
            };
            attempt += 1;
            run.set_attempt(attempt);

            let details: IslandDetails = match serde_json::from_str(frame.as_str()) {
                Ok(details) => details,
                Err(err) => {
                    return ReadinessOutcome::Fatal(format!("malformed readiness frame: {err}"))
                }
            };
            if let Some(outcome) = classify(&details, true) {
                return outcome;
            }
        }
        // Channel closed without a terminal frame.
        ReadinessOutcome::TimedOut
    }
}

#[async_trait]
impl ReadinessStrategy for PushReadiness {
    async fn await_ready(&self, run: &RunHandle) -> ReadinessOutcome {
        tokio::select! {
            _ = run.cancel_token().cancelled() => ReadinessOutcome::Cancelled,
            outcome = tokio::time::timeout(self.max_wait, self.watch(run)) => {
                outcome.unwrap_or(ReadinessOutcome::TimedOut)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(status: IslandStatus, addr: Option<(&str, u16)>, ready: Option<bool>) -> IslandDetails {
        IslandDetails {
            status,
            internal_ip_address: addr.map(|(h, _)| h.to_string()),
            internal_port: addr.map(|(_, p)| p),
            minecraft_ready: ready,
        }
    }

    #[test]
    fn running_with_endpoint_is_ready() {
        let d = details(IslandStatus::Running, Some(("10.0.0.5", 25566)), None);
        assert_eq!(
            classify(&d, false),
            Some(ReadinessOutcome::Ready(IslandEndpoint {
                host: "10.0.0.5".into(),
                port: 25566
            }))
        );
    }

    #[test]
    fn running_without_endpoint_is_inconsistent() {
        let d = details(IslandStatus::Running, None, Some(true));
        assert_eq!(classify(&d, false), Some(ReadinessOutcome::Inconsistent));
    }

    #[test]
    fn push_frames_wait_for_ready_flag() {
        // Push channel frames are terminal only once minecraft_ready is set.
        let warming = details(IslandStatus::Running, Some(("10.0.0.5", 25566)), Some(false));
        assert_eq!(classify(&warming, true), None);

        let ready = details(IslandStatus::Running, Some(("10.0.0.5", 25566)), Some(true));
        assert!(matches!(
            classify(&ready, true),
            Some(ReadinessOutcome::Ready(_))
        ));
    }

    #[test]
    fn error_statuses_are_terminal() {
        let d = details(IslandStatus::ErrorStart, None, None);
        assert_eq!(
            classify(&d, false),
            Some(ReadinessOutcome::IslandError(IslandStatus::ErrorStart))
        );
        let pending = details(IslandStatus::PendingStart, None, None);
        assert_eq!(classify(&pending, false), None);
    }
}
