use std::time::Instant;

use crate::orchestrator::IslandOrchestrator;
use crate::pending::PendingConnectionTracker;
use crate::team_cache::TeamResolutionCache;

/// Explicitly constructed service bundle for the HTTP surface; no ambient
/// singletons, everything injected so handlers can run against fakes.
#[derive(Clone)]
pub struct AppState {
    start: Instant,
    orchestrator: IslandOrchestrator,
    team_cache: TeamResolutionCache,
    pending: PendingConnectionTracker,
}

impl AppState {
    pub fn new(
        orchestrator: IslandOrchestrator,
        team_cache: TeamResolutionCache,
        pending: PendingConnectionTracker,
    ) -> Self {
        Self {
            start: Instant::now(),
            orchestrator,
            team_cache,
            pending,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    pub fn orchestrator(&self) -> &IslandOrchestrator {
        &self.orchestrator
    }

    pub fn team_cache(&self) -> &TeamResolutionCache {
        &self.team_cache
    }

    pub fn pending(&self) -> &PendingConnectionTracker {
        &self.pending
    }
}
