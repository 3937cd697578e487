use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use causeway::team_cache::{TeamResolutionCache, TeamSync};
use isle_sdk::types::{IslandDetails, TeamRecord};
use isle_sdk::{ControlPlaneApi, ControlPlaneError};
use tokio::sync::watch;
use uuid::Uuid;

/// Control plane that only answers team lookups, from a script, optionally
/// blocking every lookup until released.
struct FakeTeamPlane {
    lookups: Mutex<VecDeque<Result<TeamRecord, String>>>,
    calls: AtomicUsize,
    release: Option<watch::Receiver<bool>>,
}

impl FakeTeamPlane {
    fn new(lookups: Vec<Result<TeamRecord, String>>) -> Self {
        Self {
            lookups: Mutex::new(lookups.into()),
            calls: AtomicUsize::new(0),
            release: None,
        }
    }

    fn gated(mut self, release: watch::Receiver<bool>) -> Self {
        self.release = Some(release);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlPlaneApi for FakeTeamPlane {
    async fn island_details(
        &self,
        _player_id: Uuid,
    ) -> Result<Option<IslandDetails>, ControlPlaneError> {
        Err(ControlPlaneError::Transport("not scripted".into()))
    }

    async fn request_start(&self, _player_id: Uuid) -> Result<(), ControlPlaneError> {
        Err(ControlPlaneError::Transport("not scripted".into()))
    }

    async fn request_stop(&self, _player_id: Uuid) -> Result<(), ControlPlaneError> {
        Err(ControlPlaneError::Transport("not scripted".into()))
    }

    async fn request_freeze(&self, _player_id: Uuid) -> Result<(), ControlPlaneError> {
        Err(ControlPlaneError::Transport("not scripted".into()))
    }

    async fn team_by_player(&self, _player_id: Uuid) -> Result<TeamRecord, ControlPlaneError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(release) = &self.release {
            let mut release = release.clone();
            while !*release.borrow() {
                release.changed().await.expect("release sender alive");
            }
        }
        match self.lookups.lock().unwrap().pop_front() {
            Some(Ok(team)) => Ok(team),
            Some(Err(message)) => Err(ControlPlaneError::Data(message)),
            None => Err(ControlPlaneError::Transport("script exhausted".into())),
        }
    }
}

#[derive(Default)]
struct RecordingSync {
    synced: Mutex<Vec<(Uuid, Vec<Uuid>)>>,
}

#[async_trait]
impl TeamSync for RecordingSync {
    async fn on_team_synced(&self, owner_id: Uuid, member_ids: &[Uuid]) {
        self.synced
            .lock()
            .unwrap()
            .push((owner_id, member_ids.to_vec()));
    }
}

fn team(owner: Uuid, members: &[Uuid]) -> TeamRecord {
    TeamRecord {
        owner_id: owner,
        member_ids: members.to_vec(),
    }
}

#[tokio::test]
async fn concurrent_refreshes_coalesce_to_one_lookup() {
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let (release_tx, release_rx) = watch::channel(false);
    let plane = Arc::new(
        FakeTeamPlane::new(vec![Ok(team(owner, &[owner, member]))]).gated(release_rx),
    );
    let sync = Arc::new(RecordingSync::default());
    let cache = TeamResolutionCache::new(plane.clone(), sync.clone());

    let mut handles = Vec::new();
    for _ in 0..5 {
        let cache = cache.clone();
        handles.push(tokio::spawn(
            async move { cache.refresh_and_get_team_id(member).await },
        ));
    }
    while plane.calls() < 1 {
        tokio::task::yield_now().await;
    }
    release_tx.send(true).expect("receiver alive");

    for handle in handles {
        assert_eq!(handle.await.expect("task"), Some(owner));
    }
    // Five concurrent callers, exactly one outbound request.
    assert_eq!(plane.calls(), 1);
    assert_eq!(sync.synced.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn lookup_settles_before_the_next_caller_goes_out_again() {
    let owner = Uuid::new_v4();
    let plane = Arc::new(FakeTeamPlane::new(vec![
        Ok(team(owner, &[owner])),
        Ok(team(owner, &[owner])),
    ]));
    let cache = TeamResolutionCache::new(plane.clone(), Arc::new(RecordingSync::default()));

    assert_eq!(cache.refresh_and_get_team_id(owner).await, Some(owner));
    // The in-flight entry is gone; a fresh call issues a fresh request.
    assert_eq!(cache.refresh_and_get_team_id(owner).await, Some(owner));
    assert_eq!(plane.calls(), 2);
}

#[tokio::test]
async fn cached_value_survives_a_failed_refresh() {
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let plane = Arc::new(FakeTeamPlane::new(vec![
        Ok(team(owner, &[owner, member])),
        Err("missing owner_uuid".into()),
    ]));
    let cache = TeamResolutionCache::new(plane.clone(), Arc::new(RecordingSync::default()));

    // Nothing cached until the first successful refresh.
    assert_eq!(cache.cached_team_id(member), None);

    assert_eq!(cache.refresh_and_get_team_id(member).await, Some(owner));
    assert_eq!(cache.cached_team_id(member), Some(owner));
    assert_eq!(cache.cached_team_id(owner), Some(owner));

    // A failing refresh resolves to none but leaves the cache untouched.
    assert_eq!(cache.refresh_and_get_team_id(member).await, None);
    assert_eq!(cache.cached_team_id(member), Some(owner));
}

#[tokio::test]
async fn refresh_caches_the_caller_even_when_the_payload_omits_them() {
    let owner = Uuid::new_v4();
    let joining = Uuid::new_v4();
    // Membership payloads can trail an invite by one cycle; the caller still
    // resolves to the team the control plane answered with.
    let plane = Arc::new(FakeTeamPlane::new(vec![Ok(team(owner, &[owner]))]));
    let cache = TeamResolutionCache::new(plane, Arc::new(RecordingSync::default()));

    assert_eq!(cache.refresh_and_get_team_id(joining).await, Some(owner));
    assert_eq!(cache.cached_team_id(joining), Some(owner));
}

#[tokio::test]
async fn successful_refresh_notifies_the_sync_collaborator() {
    let owner = Uuid::new_v4();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let plane = Arc::new(FakeTeamPlane::new(vec![Ok(team(owner, &[owner, a, b]))]));
    let sync = Arc::new(RecordingSync::default());
    let cache = TeamResolutionCache::new(plane, sync.clone());

    cache.refresh_and_get_team_id(a).await;

    let synced = sync.synced.lock().unwrap();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].0, owner);
    assert_eq!(synced[0].1, vec![owner, a, b]);

    // Every member resolves to the owner's team after one refresh.
    assert_eq!(cache.cached_team_id(b), Some(owner));
}
