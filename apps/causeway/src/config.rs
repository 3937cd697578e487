use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub control_plane_url: String,
    pub proxy_admin_url: String,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub readiness_mode: ReadinessMode,
    pub push_ws_base: Option<String>,
    pub fallback_backend: Option<String>,
    pub freeze_on_disconnect: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = std::env::var("CAUSEWAY_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8090".into())
            .parse()
            .expect("valid bind addr");
        let log_filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,causeway=debug".into());
        let control_plane_url = std::env::var("ISLAND_CONTROL_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into());
        let proxy_admin_url = std::env::var("CAUSEWAY_PROXY_ADMIN_URL")
            .unwrap_or_else(|_| "http://localhost:8091".into());
        let request_timeout_ms = std::env::var("CAUSEWAY_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5_000);
        let poll_interval_ms = std::env::var("CAUSEWAY_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2_000);
        let poll_max_attempts = std::env::var("CAUSEWAY_POLL_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);
        let readiness_mode = ReadinessMode::from_env();
        let push_ws_base = std::env::var("CAUSEWAY_PUSH_WS_BASE").ok();
        let fallback_backend = std::env::var("CAUSEWAY_FALLBACK_BACKEND").ok();
        let freeze_on_disconnect = std::env::var("CAUSEWAY_FREEZE_ON_DISCONNECT")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
            .unwrap_or(false);
        Self {
            bind_addr,
            log_filter,
            control_plane_url,
            proxy_admin_url,
            request_timeout_ms,
            poll_interval_ms,
            poll_max_attempts,
            readiness_mode,
            push_ws_base,
            fallback_backend,
            freeze_on_disconnect,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8090".parse().expect("valid bind addr"),
            log_filter: "info,causeway=debug".into(),
            control_plane_url: "http://localhost:8000".into(),
            proxy_admin_url: "http://localhost:8091".into(),
            request_timeout_ms: 5_000,
            poll_interval_ms: 2_000,
            poll_max_attempts: 15,
            readiness_mode: ReadinessMode::Poll,
            push_ws_base: None,
            fallback_backend: None,
            freeze_on_disconnect: false,
        }
    }
}

/// How island readiness is detected after a start request: active polling of
/// island details, or a push channel streaming readiness frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessMode {
    Poll,
    Push,
}

impl ReadinessMode {
    fn from_env() -> Self {
        match std::env::var("CAUSEWAY_READINESS_MODE")
            .unwrap_or_else(|_| "poll".into())
            .as_str()
        {
            "push" => ReadinessMode::Push,
            _ => ReadinessMode::Poll,
        }
    }
}
