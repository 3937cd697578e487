//! Asynchronous client for the island control-plane API.
//!
//! The control plane is the sole source of truth for island lifecycle and
//! team membership. This crate keeps the client deliberately thin: one
//! attempt per call, a per-client timeout, and a uniform error envelope.
//! Retry policy belongs to the callers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use uuid::Uuid;

pub mod types;

use types::{IslandDetails, TeamRecord, TeamWire};

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Timeout or connection-level failure; the request may never have
    /// reached the control plane.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The control plane answered with a status the operation does not accept.
    #[error("unexpected status: {status} body={body}")]
    Protocol { status: StatusCode, body: String },
    /// The control plane answered 2xx but the payload was malformed or
    /// missing a required field.
    #[error("malformed payload: {0}")]
    Data(String),
}

/// Operations the orchestration tier needs from the control plane. Kept as a
/// trait so tests can substitute an in-memory fake.
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// `GET /islands/{playerId}`. `Ok(None)` means the control plane has no
    /// island for this player (HTTP 404).
    async fn island_details(
        &self,
        player_id: Uuid,
    ) -> Result<Option<IslandDetails>, ControlPlaneError>;

    /// `POST /islands/{playerId}/start`. A 409 means the island is already
    /// starting or running and counts as success.
    async fn request_start(&self, player_id: Uuid) -> Result<(), ControlPlaneError>;

    /// `POST /islands/{playerId}/stop`. Fire-and-forget at call sites; a
    /// lost stop wastes resources but loses no data.
    async fn request_stop(&self, player_id: Uuid) -> Result<(), ControlPlaneError>;

    /// `POST /islands/{playerId}/freeze`. Same contract as stop.
    async fn request_freeze(&self, player_id: Uuid) -> Result<(), ControlPlaneError>;

    /// `GET /teams/my_team/{playerId}`.
    async fn team_by_player(&self, player_id: Uuid) -> Result<TeamRecord, ControlPlaneError>;
}

impl From<reqwest::Error> for ControlPlaneError {
    fn from(err: reqwest::Error) -> Self {
        ControlPlaneError::Transport(err.to_string())
    }
}

#[derive(Clone)]
pub struct ControlPlaneClient {
    http: Client,
    base_url: String,
}

impl ControlPlaneClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ControlPlaneError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { http, base_url })
    }

    async fn post_empty(
        &self,
        url: String,
        accept_conflict: bool,
    ) -> Result<(), ControlPlaneError> {
        let res = self.http.post(url).send().await?;
        let status = res.status();
        if status.is_success() || (accept_conflict && status == StatusCode::CONFLICT) {
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        Err(ControlPlaneError::Protocol { status, body })
    }
}

#[async_trait]
impl ControlPlaneApi for ControlPlaneClient {
    async fn island_details(
        &self,
        player_id: Uuid,
    ) -> Result<Option<IslandDetails>, ControlPlaneError> {
        let url = format!("{}/islands/{}", self.base_url, player_id);
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Protocol { status, body });
        }
        let body = res.text().await?;
        let details: IslandDetails =
            serde_json::from_str(&body).map_err(|e| ControlPlaneError::Data(e.to_string()))?;
        Ok(Some(details))
    }

    async fn request_start(&self, player_id: Uuid) -> Result<(), ControlPlaneError> {
        let url = format!("{}/islands/{}/start", self.base_url, player_id);
        self.post_empty(url, true).await
    }

    async fn request_stop(&self, player_id: Uuid) -> Result<(), ControlPlaneError> {
        let url = format!("{}/islands/{}/stop", self.base_url, player_id);
        self.post_empty(url, false).await
    }

    async fn request_freeze(&self, player_id: Uuid) -> Result<(), ControlPlaneError> {
        let url = format!("{}/islands/{}/freeze", self.base_url, player_id);
        self.post_empty(url, false).await
    }

    async fn team_by_player(&self, player_id: Uuid) -> Result<TeamRecord, ControlPlaneError> {
        let url = format!("{}/teams/my_team/{}", self.base_url, player_id);
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Protocol { status, body });
        }
        let body = res.text().await?;
        let wire: TeamWire =
            serde_json::from_str(&body).map_err(|e| ControlPlaneError::Data(e.to_string()))?;
        parse_team(wire)
    }
}

fn parse_team(wire: TeamWire) -> Result<TeamRecord, ControlPlaneError> {
    let owner_id = Uuid::parse_str(&wire.owner_uuid)
        .map_err(|_| ControlPlaneError::Data(format!("bad owner_uuid: {}", wire.owner_uuid)))?;
    let mut member_ids = Vec::with_capacity(wire.members.len());
    for member in wire.members {
        let id = Uuid::parse_str(&member.player_uuid).map_err(|_| {
            ControlPlaneError::Data(format!("bad member player_uuid: {}", member.player_uuid))
        })?;
        member_ids.push(id);
    }
    Ok(TeamRecord {
        owner_id,
        member_ids,
    })
}
