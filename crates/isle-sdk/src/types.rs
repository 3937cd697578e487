//! Wire types for the island control-plane REST surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status reported by the control plane for an island instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IslandStatus {
    Unknown,
    PendingCreation,
    Creating,
    QueuedStart,
    PendingStart,
    Running,
    Stopped,
    Frozen,
    ErrorCreate,
    ErrorStart,
    #[serde(other)]
    Error,
}

impl IslandStatus {
    /// Terminal error statuses; an island in one of these will not come up
    /// without operator intervention.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            IslandStatus::ErrorCreate | IslandStatus::ErrorStart | IslandStatus::Error
        )
    }
}

/// Response body of `GET /islands/{playerId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IslandDetails {
    pub status: IslandStatus,
    #[serde(default)]
    pub internal_ip_address: Option<String>,
    #[serde(default)]
    pub internal_port: Option<u16>,
    #[serde(default)]
    pub minecraft_ready: Option<bool>,
}

impl IslandDetails {
    /// The routable endpoint, present only when the island is RUNNING and
    /// the control plane reported an address. RUNNING without an endpoint is
    /// a control-plane inconsistency the caller must handle.
    pub fn endpoint(&self) -> Option<IslandEndpoint> {
        if self.status != IslandStatus::Running {
            return None;
        }
        match (&self.internal_ip_address, self.internal_port) {
            (Some(host), Some(port)) => Some(IslandEndpoint {
                host: host.clone(),
                port,
            }),
            _ => None,
        }
    }
}

/// Address of a running island instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandEndpoint {
    pub host: String,
    pub port: u16,
}

/// Membership role within a team. The owner is always the leader; demoting
/// the owner is not a thing, a team without its owner is disbanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Member,
}

/// Team membership as reported by `GET /teams/my_team/{playerId}`. The team
/// id is its owner's player id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRecord {
    pub owner_id: Uuid,
    pub member_ids: Vec<Uuid>,
}

impl TeamRecord {
    pub fn team_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn role_of(&self, player_id: Uuid) -> Option<Role> {
        if player_id == self.owner_id {
            Some(Role::Leader)
        } else if self.member_ids.contains(&player_id) {
            Some(Role::Member)
        } else {
            None
        }
    }

    /// Owner plus members, deduplicated, owner first.
    pub fn all_members(&self) -> Vec<Uuid> {
        let mut all = vec![self.owner_id];
        for id in &self.member_ids {
            if !all.contains(id) {
                all.push(*id);
            }
        }
        all
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TeamWire {
    pub owner_uuid: String,
    #[serde(default)]
    pub members: Vec<TeamMemberWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TeamMemberWire {
    pub player_uuid: String,
}
