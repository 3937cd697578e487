use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    uptime_secs: u64,
}

async fn health() -> &'static str {
    "ok"
}

async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
    })
}

#[derive(Serialize)]
struct ConnectResponse {
    accepted: bool,
    already_pending: bool,
}

/// Trigger endpoint for the proxy tier. The run can wait on the island for
/// tens of seconds, so it is spawned and the trigger acknowledged right
/// away; a trigger for a player with an active run is a no-op.
async fn connect(
    State(state): State<AppState>,
    Path(player_id): Path<Uuid>,
) -> (StatusCode, Json<ConnectResponse>) {
    let already_pending = state.pending().is_pending(player_id);
    if !already_pending {
        let _run = state.orchestrator().spawn_connect(player_id);
    }
    (
        StatusCode::ACCEPTED,
        Json(ConnectResponse {
            accepted: true,
            already_pending,
        }),
    )
}

async fn disconnect(State(state): State<AppState>, Path(player_id): Path<Uuid>) -> StatusCode {
    state.orchestrator().disconnect_player(player_id).await;
    StatusCode::OK
}

#[derive(Deserialize)]
struct TeamQuery {
    #[serde(default)]
    refresh: bool,
}

#[derive(Serialize)]
struct TeamResponse {
    player_id: Uuid,
    team_id: Option<Uuid>,
    refreshed: bool,
}

async fn team(
    State(state): State<AppState>,
    Path(player_id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Json<TeamResponse> {
    let team_id = if query.refresh {
        state.team_cache().refresh_and_get_team_id(player_id).await
    } else {
        state.team_cache().cached_team_id(player_id)
    };
    Json(TeamResponse {
        player_id,
        team_id,
        refreshed: query.refresh,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(ready))
        .route("/players/:player_id/connect", post(connect))
        .route("/players/:player_id/disconnect", post(disconnect))
        .route("/players/:player_id/team", get(team))
        .with_state(state)
}
