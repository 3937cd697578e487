use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use causeway::config::{Config, ReadinessMode};
use causeway::orchestrator::IslandOrchestrator;
use causeway::pending::PendingConnectionTracker;
use causeway::readiness::{PollingReadiness, PushReadiness, ReadinessStrategy};
use causeway::registry::DynamicBackendRegistry;
use causeway::router_http::HttpProxyRouter;
use causeway::routes;
use causeway::state::AppState;
use causeway::team_cache::{LoggingTeamSync, TeamResolutionCache};
use causeway::telemetry::init_tracing;
use isle_sdk::{ControlPlaneApi, ControlPlaneClient};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env();
    init_tracing(&cfg.log_filter);

    let request_timeout = Duration::from_millis(cfg.request_timeout_ms);
    let control: Arc<dyn ControlPlaneApi> = Arc::new(
        ControlPlaneClient::new(&cfg.control_plane_url, request_timeout)
            .context("control-plane client")?,
    );

    let router_tier = Arc::new(
        HttpProxyRouter::new(&cfg.proxy_admin_url, request_timeout)
            .map_err(|err| anyhow::anyhow!("proxy router: {err}"))?,
    );

    let poll_interval = Duration::from_millis(cfg.poll_interval_ms);
    let max_wait = poll_interval * cfg.poll_max_attempts;
    let readiness: Arc<dyn ReadinessStrategy> = match cfg.readiness_mode {
        ReadinessMode::Poll => Arc::new(PollingReadiness::new(
            control.clone(),
            poll_interval,
            cfg.poll_max_attempts,
        )),
        ReadinessMode::Push => {
            let ws_base = cfg
                .push_ws_base
                .clone()
                .unwrap_or_else(|| cfg.control_plane_url.replacen("http", "ws", 1));
            Arc::new(PushReadiness::new(ws_base, max_wait))
        }
    };

    let registry = DynamicBackendRegistry::new(router_tier.clone());
    let pending = PendingConnectionTracker::new();
    let orchestrator = IslandOrchestrator::new(
        control.clone(),
        router_tier,
        registry,
        pending.clone(),
        readiness,
        cfg.fallback_backend.clone(),
        cfg.freeze_on_disconnect,
    );
    let team_cache = TeamResolutionCache::new(control, Arc::new(LoggingTeamSync));

    let app: Router = routes::router(AppState::new(orchestrator, team_cache, pending))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!(
        addr = %cfg.bind_addr,
        control_plane = %cfg.control_plane_url,
        mode = ?cfg.readiness_mode,
        "causeway listening"
    );
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .context("bind")?;
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
