//! Integration tests for the offline store and sync coordinator
//!
//! These drive the full offline pipeline: normalize a captured reply, save
//! the trips, push them through a scripted remote, then reopen the store
//! from disk and check what survived.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use wayfarer_core::config::SyncConfig;
use wayfarer_core::normalize::trips_from_text;
use wayfarer_core::{
    Error, OfflineTripStore, RemoteTrips, Result, SyncCoordinator, SyncStateStore, SyncStatus,
    Trip,
};

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture_trips(name: &str) -> Vec<Trip> {
    let text = std::fs::read_to_string(fixture_path(name)).expect("fixture should be readable");
    trips_from_text(&text).expect("fixture should contain trips")
}

/// Remote that assigns sequential server ids, but refuses trips whose
/// title contains a poison word. Updates and deletes are logged by id.
struct SequentialRemote {
    next_id: AtomicI64,
    poison: Option<String>,
    updates: Arc<Mutex<Vec<i64>>>,
    deletes: Arc<Mutex<Vec<i64>>>,
}

impl SequentialRemote {
    fn new() -> Self {
        Self {
            next_id: AtomicI64::new(100),
            poison: None,
            updates: Arc::new(Mutex::new(Vec::new())),
            deletes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn poisoned(word: &str) -> Self {
        Self {
            poison: Some(word.to_string()),
            ..Self::new()
        }
    }

    fn update_log(&self) -> Arc<Mutex<Vec<i64>>> {
        Arc::clone(&self.updates)
    }

    fn delete_log(&self) -> Arc<Mutex<Vec<i64>>> {
        Arc::clone(&self.deletes)
    }
}

#[async_trait]
impl RemoteTrips for SequentialRemote {
    async fn create_trip(&self, trip: &Trip) -> Result<Trip> {
        if let Some(word) = &self.poison {
            if trip.title.contains(word.as_str()) {
                return Err(Error::Api {
                    status: 503,
                    message: "service unavailable".to_string(),
                });
            }
        }
        let mut created = trip.clone();
        created.id = created
            .id
            .with_server_id(self.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(created)
    }

    async fn update_trip(&self, id: i64, trip: &Trip) -> Result<Trip> {
        self.updates.lock().unwrap().push(id);
        let mut updated = trip.clone();
        updated.id = updated.id.with_server_id(id);
        Ok(updated)
    }

    async fn delete_trip(&self, id: i64) -> Result<bool> {
        self.deletes.lock().unwrap().push(id);
        Ok(true)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

fn online_coordinator(remote: SequentialRemote) -> SyncCoordinator {
    let mut c = SyncCoordinator::new(
        Box::new(remote),
        SyncStateStore::in_memory(),
        &SyncConfig::default(),
    );
    c.set_online(true);
    c
}

// ============================================
// Full Pipeline Tests
// ============================================

#[tokio::test]
async fn test_normalize_save_sync_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trips.json");

    {
        let mut store = OfflineTripStore::open(&path).unwrap();
        for trip in fixture_trips("alps-reply.txt") {
            store.save(trip).unwrap();
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.status_counts(), (2, 0, 0));

        let mut coordinator = online_coordinator(SequentialRemote::new());
        let outcome = coordinator.sync(&mut store).await.unwrap();
        assert_eq!(outcome.synced, 2);
        assert_eq!(outcome.summary(), "2 synced");
        assert!(coordinator.last_sync_attempt().is_some());
    }

    // Reopen from disk: statuses and promoted identities persisted
    let store = OfflineTripStore::open(&path).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.status_counts(), (0, 2, 0));

    let tmb = store.get("alps-a").expect("local key still resolves");
    assert_eq!(tmb.status, SyncStatus::Synced);
    let server_id = tmb.trip.id.server_id().expect("server id recorded");
    assert!(store.has(&server_id.to_string()));
    assert!(store.has("offline-alps-a"));
}

#[tokio::test]
async fn test_partial_failure_keeps_failed_in_queue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trips.json");
    let mut store = OfflineTripStore::open(&path).unwrap();
    for trip in fixture_trips("alps-reply.txt") {
        store.save(trip).unwrap();
    }

    // First pass: the Aosta trip is refused, the TMB trip lands
    let mut coordinator = online_coordinator(SequentialRemote::poisoned("Aosta"));
    let outcome = coordinator.sync(&mut store).await.unwrap();
    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.synced, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.summary(), "1 synced, 1 failed");
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].1.contains("service unavailable"));

    assert_eq!(store.get("alps-a").unwrap().status, SyncStatus::Synced);
    let aosta = store.get("alps-b").unwrap();
    assert_eq!(aosta.status, SyncStatus::Failed);
    assert_eq!(aosta.sync_attempts, 1);

    // Second pass with a healthy remote: only the failed entry is pushed
    let mut coordinator = online_coordinator(SequentialRemote::new());
    let outcome = coordinator.sync(&mut store).await.unwrap();
    assert_eq!(outcome.attempted, 1);
    assert_eq!(outcome.synced, 1);
    assert_eq!(store.status_counts(), (0, 2, 0));
}

#[tokio::test]
async fn test_offline_sync_changes_nothing_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trips.json");
    let mut store = OfflineTripStore::open(&path).unwrap();
    for trip in fixture_trips("raw-trips.json") {
        store.save(trip).unwrap();
    }
    let before = std::fs::read_to_string(&path).unwrap();

    let mut coordinator = SyncCoordinator::new(
        Box::new(SequentialRemote::new()),
        SyncStateStore::in_memory(),
        &SyncConfig::default(),
    );
    let outcome = coordinator.sync(&mut store).await.unwrap();

    assert!(outcome.skipped_offline);
    assert_eq!(store.status_counts(), (2, 0, 0));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

// ============================================
// Deletion Tests
// ============================================

#[tokio::test]
async fn test_delete_unsynced_trip_never_hits_remote() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trips.json");
    let mut store = OfflineTripStore::open(&path).unwrap();
    for trip in fixture_trips("partial-trips-reply.txt") {
        store.save(trip).unwrap();
    }

    let remote = SequentialRemote::new();
    let deletes = remote.delete_log();
    let mut coordinator = online_coordinator(remote);

    let outcome = coordinator
        .delete(&mut store, "dolomites-1", true)
        .await
        .unwrap();
    assert!(outcome.removed_local);
    assert!(!outcome.removed_remote);
    assert!(deletes.lock().unwrap().is_empty());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_delete_synced_trip_hits_remote_once() {
    let mut store = OfflineTripStore::in_memory();
    for trip in fixture_trips("raw-trips.json") {
        store.save(trip).unwrap();
    }

    let remote = SequentialRemote::new();
    let deletes = remote.delete_log();
    let mut coordinator = online_coordinator(remote);
    coordinator.sync(&mut store).await.unwrap();

    let server_id = store.get("export-1").unwrap().trip.id.server_id().unwrap();
    let outcome = coordinator
        .delete(&mut store, "export-1", true)
        .await
        .unwrap();
    assert!(outcome.removed_local);
    assert!(outcome.removed_remote);
    assert_eq!(*deletes.lock().unwrap(), vec![server_id]);
}

// ============================================
// Store Robustness Tests
// ============================================

#[tokio::test]
async fn test_resaving_synced_trip_requeues_it() {
    let mut store = OfflineTripStore::in_memory();
    let trips = fixture_trips("raw-trips.json");
    store.save(trips[0].clone()).unwrap();

    let mut coordinator = online_coordinator(SequentialRemote::new());
    coordinator.sync(&mut store).await.unwrap();
    let server_id = store.get("export-1").unwrap().trip.id.server_id().unwrap();

    // A re-normalized copy of the same trip arrives (same local id). It
    // upserts in place, goes back to pending, and keeps the server id.
    store.save(trips[0].clone()).unwrap();
    assert_eq!(store.len(), 1);
    let entry = store.get("export-1").unwrap();
    assert_eq!(entry.status, SyncStatus::Pending);
    assert_eq!(entry.trip.id.server_id(), Some(server_id));
}

#[tokio::test]
async fn test_second_pass_updates_the_existing_server_copy() {
    let mut store = OfflineTripStore::in_memory();
    let trips = fixture_trips("raw-trips.json");
    store.save(trips[0].clone()).unwrap();

    let remote = SequentialRemote::new();
    let updates = remote.update_log();
    let mut coordinator = online_coordinator(remote);
    coordinator.sync(&mut store).await.unwrap();
    let server_id = store.get("export-1").unwrap().trip.id.server_id().unwrap();

    // Edited locally after the first sync: pending again, same server id
    store.save(trips[0].clone()).unwrap();
    let outcome = coordinator.sync(&mut store).await.unwrap();
    assert_eq!(outcome.synced, 1);

    // The second push went to the existing copy; a fresh create would have
    // minted a new sequential id and left the update log empty.
    assert_eq!(*updates.lock().unwrap(), vec![server_id]);
    let entry = store.get("export-1").unwrap();
    assert_eq!(entry.status, SyncStatus::Synced);
    assert_eq!(entry.trip.id.server_id(), Some(server_id));
}

#[test]
fn test_corrupt_store_file_recovers_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trips.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let mut store = OfflineTripStore::open(&path).unwrap();
    assert!(store.is_empty());

    // and it is usable again immediately
    let trips = fixture_trips("raw-trips.json");
    store.save(trips[0].clone()).unwrap();
    assert_eq!(OfflineTripStore::open(&path).unwrap().len(), 1);
}
