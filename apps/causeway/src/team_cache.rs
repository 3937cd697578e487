use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use isle_sdk::ControlPlaneApi;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

pub type TeamId = Uuid;

/// External team/content collaborator notified after every successful team
/// refresh, e.g. to sync island progress for the whole roster.
#[async_trait]
pub trait TeamSync: Send + Sync {
    async fn on_team_synced(&self, owner_id: Uuid, member_ids: &[Uuid]);
}

/// Default collaborator: just records the sync in the log stream.
pub struct LoggingTeamSync;

#[async_trait]
impl TeamSync for LoggingTeamSync {
    async fn on_team_synced(&self, owner_id: Uuid, member_ids: &[Uuid]) {
        debug!(owner = %owner_id, members = member_ids.len(), "team synced");
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    team_id: TeamId,
    observed_at: Instant,
}

type SharedLookup = Shared<BoxFuture<'static, Option<TeamId>>>;

/// Single-flight-deduplicated cache of player → owning team, refreshed from
/// the control plane. Only successful refreshes write entries; a failed
/// refresh leaves the previous value untouched, so a stale answer is always
/// preferred over none.
#[derive(Clone)]
pub struct TeamResolutionCache {
    control: Arc<dyn ControlPlaneApi>,
    sync: Arc<dyn TeamSync>,
    entries: Arc<DashMap<Uuid, CacheEntry>>,
    in_flight: Arc<Mutex<HashMap<Uuid, SharedLookup>>>,
}

impl TeamResolutionCache {
    pub fn new(control: Arc<dyn ControlPlaneApi>, sync: Arc<dyn TeamSync>) -> Self {
        Self {
            control,
            sync,
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Refreshes the player's team from the control plane and returns the
    /// team id, or `None` if the lookup failed. Concurrent calls for the
    /// same player coalesce onto one outbound request; the in-flight handle
    /// is dropped when that request settles, success or failure, so the next
    /// caller always triggers a fresh round trip.
    pub async fn refresh_and_get_team_id(&self, player_id: Uuid) -> Option<TeamId> {
        let lookup = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(pending) = in_flight.get(&player_id) {
                pending.clone()
            } else {
                let cache = self.clone();
                let lookup: SharedLookup = async move {
                    let result = cache.fetch_and_store(player_id).await;
                    cache.in_flight.lock().await.remove(&player_id);
                    result
                }
                .boxed()
                .shared();
                in_flight.insert(player_id, lookup.clone());
                lookup
            }
        };
        lookup.await
    }

    /// Non-blocking read of the last successfully cached team id. Never
    /// triggers a refresh and may lag true membership by one refresh cycle:
    /// confirm with [`Self::refresh_and_get_team_id`] before committing an
    /// irreversible, authorization-sensitive side effect.
    pub fn cached_team_id(&self, player_id: Uuid) -> Option<TeamId> {
        self.entries.get(&player_id).map(|entry| entry.team_id)
    }

    /// Age of the cached value, if any.
    pub fn cached_age(&self, player_id: Uuid) -> Option<std::time::Duration> {
        self.entries
            .get(&player_id)
            .map(|entry| entry.observed_at.elapsed())
    }

    async fn fetch_and_store(&self, player_id: Uuid) -> Option<TeamId> {
        match self.control.team_by_player(player_id).await {
            Ok(team) => {
                let team_id = team.team_id();
                let observed_at = Instant::now();
                // The batch is not atomic across members; a concurrent reader
                // may see part of it, never anything older than one refresh.
                // The requesting player is written last, so once this call
                // resolves their own entry is current.
                for member in team.all_members() {
                    if member == player_id {
                        continue;
                    }
                    self.entries.insert(
                        member,
                        CacheEntry {
                            team_id,
                            observed_at,
                        },
                    );
                }
                self.entries.insert(
                    player_id,
                    CacheEntry {
                        team_id,
                        observed_at,
                    },
                );
                self.sync
                    .on_team_synced(team.owner_id, &team.member_ids)
                    .await;
                debug!(player = %player_id, team = %team_id, "team resolved");
                Some(team_id)
            }
            Err(err) => {
                warn!(player = %player_id, error = %err, "team lookup failed; cache left untouched");
                None
            }
        }
    }
}
