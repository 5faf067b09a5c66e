//! Sync coordinator: pushes offline trips to the remote collection
//!
//! This module reconciles the offline trip store against the remote trip
//! service. It owns the connectivity flag and the push loop; the store owns
//! the entries and their status transitions.
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ OfflineTripStore │ ──► │ SyncCoordinator │ ──► │  RemoteTrips     │
//! │ (pending trips)  │     │                 │     │ (TripApiClient)  │
//! └──────────────────┘     └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Push loop
//!
//! The loop is strictly sequential: one remote call in flight at a time,
//! trips taken in store order. An entry that has never been on the server
//! goes out as a create; an entry that already holds a server id (requeued
//! after a mid-flight edit, or re-saved after an earlier sync) goes out as
//! an update against that id, so the server never gets a second copy. A
//! failed push marks that one entry `failed` and moves on; it never aborts
//! the batch. Per-pass eligibility comes from
//! [`OfflineTripStore::sync_queue`]: everything `pending`, plus `failed`
//! entries that still have automatic attempts left.
//!
//! ## Connectivity
//!
//! The coordinator never polls. The environment decides when to probe
//! (the CLI hits the server's health endpoint) and pushes the result in
//! through [`SyncCoordinator::set_online`]; while offline, `sync` is a
//! recorded no-op.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = TripApiClient::new(config.api.clone())?;
//! let state = SyncStateStore::open(config.sync_state_path())?;
//! let mut coordinator = SyncCoordinator::new(Box::new(client), state, &config.sync);
//!
//! if coordinator.probe().await {
//!     let outcome = coordinator.sync(&mut store).await?;
//!     println!("{}", outcome.summary());
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::TripApiClient;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::store::{OfflineTripStore, SyncStateStore};
use crate::types::Trip;

// ============================================
// Remote seam
// ============================================

/// The slice of the trip service the coordinator needs.
///
/// [`TripApiClient`] is the production implementation; tests script
/// outcomes with a fake.
#[async_trait]
pub trait RemoteTrips: Send + Sync {
    /// Create a trip remotely; the returned trip carries the
    /// server-assigned id.
    async fn create_trip(&self, trip: &Trip) -> Result<Trip>;

    /// Push new content to an existing server copy.
    async fn update_trip(&self, id: i64, trip: &Trip) -> Result<Trip>;

    /// Delete the server copy of a trip. `false` when it did not exist.
    async fn delete_trip(&self, id: i64) -> Result<bool>;

    /// Probe whether the server is reachable at all.
    async fn health_check(&self) -> Result<bool>;
}

#[async_trait]
impl RemoteTrips for TripApiClient {
    async fn create_trip(&self, trip: &Trip) -> Result<Trip> {
        // In-call retry covers transient blips; pass-level retry for
        // everything else is the store's attempt counter.
        self.create_trip_with_retry(trip).await
    }

    async fn update_trip(&self, id: i64, trip: &Trip) -> Result<Trip> {
        TripApiClient::update_trip(self, id, trip).await
    }

    async fn delete_trip(&self, id: i64) -> Result<bool> {
        TripApiClient::delete_trip(self, id).await
    }

    async fn health_check(&self) -> Result<bool> {
        TripApiClient::health_check(self).await
    }
}

// ============================================
// Outcomes
// ============================================

/// Aggregate result of one sync pass.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Entries the pass tried to push
    pub attempted: usize,
    /// Entries now `synced`
    pub synced: usize,
    /// Entries now `failed`
    pub failed: usize,
    /// Entries pushed successfully but edited mid-flight; they keep their
    /// server id and stay `pending` for the next pass
    pub requeued: usize,
    /// True when the pass was skipped because the coordinator was offline
    pub skipped_offline: bool,
    /// Per-trip failures (offline id → error message)
    pub errors: Vec<(String, String)>,
}

impl SyncOutcome {
    fn skipped() -> Self {
        Self {
            skipped_offline: true,
            ..Default::default()
        }
    }

    /// Whether the pass pushed nothing at all.
    pub fn is_noop(&self) -> bool {
        self.attempted == 0
    }

    /// One line for the user: "2 synced, 1 failed".
    pub fn summary(&self) -> String {
        if self.skipped_offline {
            return "offline, sync skipped".to_string();
        }
        if self.attempted == 0 {
            return "nothing to sync".to_string();
        }
        let mut parts = vec![format!("{} synced", self.synced)];
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if self.requeued > 0 {
            parts.push(format!("{} requeued", self.requeued));
        }
        parts.join(", ")
    }
}

/// Result of an explicit trip deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// An entry was removed from the offline store
    pub removed_local: bool,
    /// A server copy was removed
    pub removed_remote: bool,
}

// ============================================
// Coordinator
// ============================================

/// Coordinates pushes from the offline store to the remote collection.
///
/// Holds the connectivity flag, the per-pass attempt cap, and the
/// sync-state blob (last attempt timestamp). Borrows the store per call so
/// the rest of the application can keep using it between passes.
pub struct SyncCoordinator {
    remote: Box<dyn RemoteTrips>,
    state: SyncStateStore,
    online: bool,
    max_attempts: u32,
}

impl SyncCoordinator {
    /// Create a coordinator. Starts offline; call [`Self::probe`] or
    /// [`Self::set_online`] before syncing.
    pub fn new(remote: Box<dyn RemoteTrips>, state: SyncStateStore, config: &SyncConfig) -> Self {
        Self {
            remote,
            state,
            online: false,
            max_attempts: config.max_sync_attempts,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Feed in a connectivity transition from the environment.
    pub fn set_online(&mut self, online: bool) {
        if online != self.online {
            tracing::info!(online, "connectivity changed");
        }
        self.online = online;
    }

    /// Probe the server's health endpoint and record the result.
    pub async fn probe(&mut self) -> bool {
        let online = self.remote.health_check().await.unwrap_or(false);
        self.set_online(online);
        online
    }

    /// When a sync pass last started, successful or not.
    pub fn last_sync_attempt(&self) -> Option<DateTime<Utc>> {
        self.state.last_sync_attempt()
    }

    /// Push everything eligible, sequentially, in store order.
    pub async fn sync(&mut self, store: &mut OfflineTripStore) -> Result<SyncOutcome> {
        self.sync_with_progress(store, |_, _, _| {}).await
    }

    /// Push everything eligible with a progress callback.
    ///
    /// The callback receives `(current_index, total, trip_title)` before
    /// each push, for progress bars.
    pub async fn sync_with_progress<F>(
        &mut self,
        store: &mut OfflineTripStore,
        mut on_progress: F,
    ) -> Result<SyncOutcome>
    where
        F: FnMut(usize, usize, &str),
    {
        if !self.online {
            tracing::debug!("offline, sync skipped");
            return Ok(SyncOutcome::skipped());
        }

        // Snapshot the queue up front: the store is mutated inside the
        // loop, and the `last_modified` snapshot is what detects edits
        // that land while a push is in flight.
        let queue: Vec<(String, DateTime<Utc>, Trip)> = store
            .sync_queue(self.max_attempts)
            .into_iter()
            .map(|e| (e.offline_id.clone(), e.last_modified, e.trip.clone()))
            .collect();

        if queue.is_empty() {
            tracing::debug!("nothing eligible to sync");
            return Ok(SyncOutcome::default());
        }

        self.state.record_attempt(Utc::now())?;

        let total = queue.len();
        let mut outcome = SyncOutcome {
            attempted: total,
            ..Default::default()
        };

        for (i, (offline_id, snapshot, trip)) in queue.into_iter().enumerate() {
            on_progress(i, total, &trip.title);

            // An entry that already holds a server id has a server copy;
            // creating again would duplicate it.
            let pushed = match trip.id.server_id() {
                Some(server_id) => self.remote.update_trip(server_id, &trip).await,
                None => self.remote.create_trip(&trip).await,
            };

            match pushed {
                Ok(remote_copy) => match remote_copy.id.server_id() {
                    Some(server_id) => {
                        if store.record_sync_success(&offline_id, server_id, snapshot)? {
                            outcome.synced += 1;
                        } else {
                            outcome.requeued += 1;
                        }
                        tracing::info!(offline_id = %offline_id, server_id, "trip pushed");
                    }
                    None => {
                        store.record_sync_failure(&offline_id)?;
                        outcome.failed += 1;
                        outcome.errors.push((
                            offline_id.clone(),
                            "server response carried no trip id".to_string(),
                        ));
                        tracing::warn!(offline_id = %offline_id, "push response had no id");
                    }
                },
                Err(e) => {
                    store.record_sync_failure(&offline_id)?;
                    outcome.failed += 1;
                    outcome.errors.push((offline_id.clone(), e.to_string()));
                    tracing::warn!(offline_id = %offline_id, error = %e, "trip push failed");
                }
            }
        }

        tracing::info!(
            attempted = outcome.attempted,
            synced = outcome.synced,
            failed = outcome.failed,
            "sync pass complete"
        );

        Ok(outcome)
    }

    /// Delete a trip, locally and (when asked) remotely.
    ///
    /// The remote delete happens first so a failure leaves the local copy
    /// untouched. It is only ever attempted when the entry actually has a
    /// server id: a trip that never synced has no server copy to delete.
    pub async fn delete(
        &mut self,
        store: &mut OfflineTripStore,
        key: &str,
        also_remote: bool,
    ) -> Result<DeleteOutcome> {
        let server_id = match store.get(key) {
            Some(entry) => entry.trip.id.server_id(),
            None => {
                return Ok(DeleteOutcome {
                    removed_local: false,
                    removed_remote: false,
                })
            }
        };

        let removed_remote = match (also_remote, server_id) {
            (true, Some(id)) => {
                let removed = self.remote.delete_trip(id).await?;
                tracing::info!(server_id = id, removed, "remote trip delete");
                removed
            }
            _ => false,
        };

        let removed_local = store.remove(key)?;
        Ok(DeleteOutcome {
            removed_local,
            removed_remote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{Journey, LngLat, TripId};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn trip(id: &str, title: &str) -> Trip {
        Trip {
            id: TripId::Local(id.to_string()),
            title: title.to_string(),
            description: String::new(),
            location: String::new(),
            duration: String::new(),
            difficulty: String::new(),
            price_estimate: String::new(),
            why_we_chose_this: String::new(),
            map_center: LngLat::default(),
            markers: Vec::new(),
            journey: Journey::default(),
            itinerary: Vec::new(),
            activities: Vec::new(),
            suggested_guides: Vec::new(),
        }
    }

    /// Remote fake with a script of create outcomes, consumed in order.
    /// Updates always succeed and are logged by server id, as are deletes;
    /// the logs are shared so tests can keep a handle after the coordinator
    /// takes ownership of the fake.
    struct ScriptedRemote {
        creates: Mutex<VecDeque<std::result::Result<i64, Error>>>,
        updates: Arc<Mutex<Vec<i64>>>,
        deletes: Arc<Mutex<Vec<i64>>>,
        healthy: bool,
    }

    impl ScriptedRemote {
        fn new(creates: Vec<std::result::Result<i64, Error>>) -> Self {
            Self {
                creates: Mutex::new(creates.into()),
                updates: Arc::new(Mutex::new(Vec::new())),
                deletes: Arc::new(Mutex::new(Vec::new())),
                healthy: true,
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
    impl RemoteTrips for ScriptedRemote {
        async fn create_trip(&self, trip: &Trip) -> Result<Trip> {
            let next = self
                .creates
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected create_trip call");
            next.map(|server_id| {
                let mut created = trip.clone();
                created.id = created.id.with_server_id(server_id);
                created
            })
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
            Ok(self.healthy)
        }
    }

    fn coordinator(remote: ScriptedRemote) -> SyncCoordinator {
        let mut c = SyncCoordinator::new(
            Box::new(remote),
            SyncStateStore::in_memory(),
            &SyncConfig::default(),
        );
        c.set_online(true);
        c
    }

    #[tokio::test]
    async fn offline_sync_is_a_noop() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        let mut c = coordinator(ScriptedRemote::new(vec![]));
        c.set_online(false);

        let outcome = c.sync(&mut store).await.unwrap();
        assert!(outcome.skipped_offline);
        assert_eq!(outcome.summary(), "offline, sync skipped");
        // The store is untouched and no attempt was recorded
        assert_eq!(store.get("x1").unwrap().status, crate::types::SyncStatus::Pending);
        assert!(c.last_sync_attempt().is_none());
    }

    #[tokio::test]
    async fn empty_queue_is_a_noop() {
        let mut store = OfflineTripStore::in_memory();
        let mut c = coordinator(ScriptedRemote::new(vec![]));

        let outcome = c.sync(&mut store).await.unwrap();
        assert!(outcome.is_noop());
        assert!(!outcome.skipped_offline);
        assert_eq!(outcome.summary(), "nothing to sync");
        assert!(c.last_sync_attempt().is_none());
    }

    #[tokio::test]
    async fn successful_pass_promotes_to_synced() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        let mut c = coordinator(ScriptedRemote::new(vec![Ok(42)]));
        let outcome = c.sync(&mut store).await.unwrap();

        assert_eq!(outcome.synced, 1);
        assert_eq!(outcome.summary(), "1 synced");
        assert!(c.last_sync_attempt().is_some());

        let entry = store.get("x1").unwrap();
        assert_eq!(entry.status, crate::types::SyncStatus::Synced);
        assert_eq!(entry.trip.id.server_id(), Some(42));
        // The original key still resolves after the id promotion
        assert!(store.has("42"));
        assert!(store.has("x1"));
    }

    #[tokio::test]
    async fn partial_failure_continues_the_batch() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("a", "First")).unwrap();
        store.save(trip("b", "Second")).unwrap();
        store.save(trip("c", "Third")).unwrap();

        let mut c = coordinator(ScriptedRemote::new(vec![
            Ok(1),
            Err(Error::Api {
                status: 503,
                message: "maintenance".to_string(),
            }),
            Ok(3),
        ]));

        let outcome = c.sync(&mut store).await.unwrap();
        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.synced, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.summary(), "2 synced, 1 failed");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].0, "offline-b");

        use crate::types::SyncStatus;
        assert_eq!(store.get("a").unwrap().status, SyncStatus::Synced);
        assert_eq!(store.get("b").unwrap().status, SyncStatus::Failed);
        assert_eq!(store.get("b").unwrap().sync_attempts, 1);
        assert_eq!(store.get("c").unwrap().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn failed_entries_are_retried_until_the_cap() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        let failure = || {
            Err(Error::Api {
                status: 500,
                message: "boom".to_string(),
            })
        };

        // max_sync_attempts defaults to 3: three failing passes, then the
        // entry drops out of the queue.
        let mut c = coordinator(ScriptedRemote::new(vec![failure(), failure(), failure()]));
        for expected_attempts in 1..=3u32 {
            let outcome = c.sync(&mut store).await.unwrap();
            assert_eq!(outcome.failed, 1);
            assert_eq!(store.get("x1").unwrap().sync_attempts, expected_attempts);
        }

        // Fourth pass: no eligible entries, no create call (the script is
        // exhausted, so an unexpected call would panic).
        let outcome = c.sync(&mut store).await.unwrap();
        assert!(outcome.is_noop());

        // Manual retry re-arms it
        store.retry("x1").unwrap();
        assert_eq!(store.sync_queue(3).len(), 1);
    }

    #[tokio::test]
    async fn synced_entries_are_never_reprocessed() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        let mut c = coordinator(ScriptedRemote::new(vec![Ok(42)]));
        c.sync(&mut store).await.unwrap();

        // Second pass: script exhausted; a reprocess would panic the fake.
        let outcome = c.sync(&mut store).await.unwrap();
        assert!(outcome.is_noop());
    }

    #[tokio::test]
    async fn resaved_synced_trip_is_pushed_as_update_not_create() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        let remote = ScriptedRemote::new(vec![Ok(42)]);
        let updates = remote.update_log();
        let mut c = coordinator(remote);
        c.sync(&mut store).await.unwrap();

        // Edited locally after the sync: pending again, server id kept
        store.save(trip("x1", "Fjords, revised")).unwrap();

        // The create script is exhausted, so a second create would panic
        // the fake; the entry must go out against its existing server copy.
        let outcome = c.sync(&mut store).await.unwrap();
        assert_eq!(outcome.synced, 1);
        assert_eq!(*updates.lock().unwrap(), vec![42]);

        let entry = store.get("x1").unwrap();
        assert_eq!(entry.status, crate::types::SyncStatus::Synced);
        assert_eq!(entry.trip.id.server_id(), Some(42));
    }

    #[tokio::test]
    async fn create_without_id_counts_as_failure() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        struct EchoRemote;
        #[async_trait]
        impl RemoteTrips for EchoRemote {
            async fn create_trip(&self, trip: &Trip) -> Result<Trip> {
                Ok(trip.clone()) // echoes back without assigning an id
            }
            async fn update_trip(&self, _id: i64, trip: &Trip) -> Result<Trip> {
                Ok(trip.clone())
            }
            async fn delete_trip(&self, _id: i64) -> Result<bool> {
                Ok(false)
            }
            async fn health_check(&self) -> Result<bool> {
                Ok(true)
            }
        }

        let mut c = SyncCoordinator::new(
            Box::new(EchoRemote),
            SyncStateStore::in_memory(),
            &SyncConfig::default(),
        );
        c.set_online(true);

        let outcome = c.sync(&mut store).await.unwrap();
        assert_eq!(outcome.failed, 1);
        assert_eq!(
            store.get("x1").unwrap().status,
            crate::types::SyncStatus::Failed
        );
    }

    #[tokio::test]
    async fn probe_updates_connectivity() {
        let mut c = coordinator(ScriptedRemote::new(vec![]));
        c.set_online(false);
        assert!(!c.is_online());

        assert!(c.probe().await);
        assert!(c.is_online());

        let mut unhealthy = ScriptedRemote::new(vec![]);
        unhealthy.healthy = false;
        let mut c = coordinator(unhealthy);
        assert!(!c.probe().await);
        assert!(!c.is_online());
    }

    #[tokio::test]
    async fn delete_offline_only_trip_never_calls_remote() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        let remote = ScriptedRemote::new(vec![]);
        let deletes = remote.delete_log();
        let mut c = coordinator(remote);

        let outcome = c.delete(&mut store, "x1", true).await.unwrap();
        assert!(outcome.removed_local);
        assert!(!outcome.removed_remote);
        assert!(store.is_empty());
        // No server copy exists, so no DELETE went out even with the flag set
        assert!(deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_synced_trip_removes_both_copies() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        let remote = ScriptedRemote::new(vec![Ok(42)]);
        let deletes = remote.delete_log();
        let mut c = coordinator(remote);
        c.sync(&mut store).await.unwrap();

        let outcome = c.delete(&mut store, "42", true).await.unwrap();
        assert!(outcome.removed_local);
        assert!(outcome.removed_remote);
        assert!(store.is_empty());
        assert_eq!(*deletes.lock().unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn delete_without_remote_flag_keeps_server_copy() {
        let mut store = OfflineTripStore::in_memory();
        store.save(trip("x1", "Fjords")).unwrap();

        let remote = ScriptedRemote::new(vec![Ok(42)]);
        let deletes = remote.delete_log();
        let mut c = coordinator(remote);
        c.sync(&mut store).await.unwrap();

        let outcome = c.delete(&mut store, "42", false).await.unwrap();
        assert!(outcome.removed_local);
        assert!(!outcome.removed_remote);
        assert!(store.is_empty());
        assert!(deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_key_is_a_noop() {
        let mut store = OfflineTripStore::in_memory();
        let mut c = coordinator(ScriptedRemote::new(vec![]));

        let outcome = c.delete(&mut store, "nope", true).await.unwrap();
        assert!(!outcome.removed_local);
        assert!(!outcome.removed_remote);
    }
}
