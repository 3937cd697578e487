use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("routing tier rejected the operation: {0}")]
    Rejected(String),
    #[error("connect failed for backend {backend}: {message}")]
    ConnectFailed { backend: String, message: String },
}

/// The connection-routing tier consumed by the orchestrator. Implemented
/// against the real proxy in production and by recording fakes in tests.
#[async_trait]
pub trait ProxyRouter: Send + Sync {
    async fn register_backend(&self, name: &str, host: &str, port: u16) -> Result<(), RouterError>;
    async fn unregister_backend(&self, name: &str) -> Result<(), RouterError>;
    async fn connect_player(&self, player_id: Uuid, backend: &str) -> Result<(), RouterError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BackendRegistration {
    host: String,
    port: u16,
}

/// Logical backend name for a player's island. A pure function of the player
/// id only, so re-registration always lands on the same name and no two
/// players can ever share one.
pub fn backend_name(player_id: Uuid) -> String {
    format!("island-{}", player_id)
}

/// Live table of per-player routable destinations, mirrored into the routing
/// tier. One logical name maps to exactly one physical endpoint at a time.
#[derive(Clone)]
pub struct DynamicBackendRegistry {
    router: Arc<dyn ProxyRouter>,
    entries: Arc<DashMap<Uuid, BackendRegistration>>,
    // Serializes register/unregister per player across the router round-trip,
    // so the table and the routing tier never diverge under interleaving.
    locks: Arc<DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl DynamicBackendRegistry {
    pub fn new(router: Arc<dyn ProxyRouter>) -> Self {
        Self {
            router,
            entries: Arc::new(DashMap::new()),
            locks: Arc::new(DashMap::new()),
        }
    }

    fn player_lock(&self, player_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(player_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Registers (or refreshes) the player's backend. Idempotent: an
    /// identical existing registration is left alone; a changed host/port is
    /// updated in place so the logical name never points at a stale endpoint.
    pub async fn register(
        &self,
        player_id: Uuid,
        host: &str,
        port: u16,
    ) -> Result<String, RouterError> {
        let name = backend_name(player_id);
        let next = BackendRegistration {
            host: host.to_string(),
            port,
        };

        let lock = self.player_lock(player_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.entries.get(&player_id) {
            if *existing == next {
                debug!(player = %player_id, backend = %name, "backend already registered");
                return Ok(name);
            }
        }

        self.router.register_backend(&name, host, port).await?;
        self.entries.insert(player_id, next);
        info!(player = %player_id, backend = %name, %host, port, "registered island backend");
        Ok(name)
    }

    /// Removes the player's backend if present; no-op otherwise.
    pub async fn unregister(&self, player_id: Uuid) -> Result<(), RouterError> {
        let lock = self.player_lock(player_id);
        let _guard = lock.lock().await;

        if self.entries.remove(&player_id).is_none() {
            return Ok(());
        }
        let name = backend_name(player_id);
        self.router.unregister_backend(&name).await?;
        info!(player = %player_id, backend = %name, "unregistered island backend");
        Ok(())
    }

    pub fn is_registered(&self, player_id: Uuid) -> bool {
        self.entries.contains_key(&player_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
