//! Offline trip store
//!
//! A durable local cache of trips with explicit sync status. Two JSON
//! blobs on disk: the trip collection itself, and a small sync-state blob
//! (last sync attempt). Persistence is whole-collection overwrite: every
//! mutation rewrites the complete blob through a temp file and rename, so
//! a crash never leaves a half-written collection.
//!
//! Loading is deliberately forgiving:
//!
//! - Missing blob: start empty (first run).
//! - Corrupt blob: warn and start empty rather than failing startup; the
//!   bad file is overwritten on the next save.
//! - Blob from a newer schema version: warn and start empty instead of
//!   misreading it.
//!
//! Lookups use the dual-key rule in [`OfflineTrip::matches`]: a server id,
//! a local id, or the `offline-` form of either all resolve to the same
//! entry.

use crate::error::{Error, Result};
use crate::types::{OfflineTrip, SyncStatus, Trip};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current on-disk schema version for both blobs.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

// ============================================
// Trip collection blob
// ============================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripsBlob {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    trips: Vec<OfflineTrip>,
}

/// The offline trip collection.
pub struct OfflineTripStore {
    path: Option<PathBuf>,
    trips: Vec<OfflineTrip>,
}

impl OfflineTripStore {
    /// Open the store at `path`, loading the existing blob if there is one.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let trips = if path.exists() {
            load_trips_blob(&path)
        } else {
            Vec::new()
        };

        Ok(Self {
            path: Some(path),
            trips,
        })
    }

    /// An ephemeral store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            trips: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Save a trip for offline use.
    ///
    /// Upsert semantics: the first entry matching the trip's id (either
    /// key) is replaced in place, keeping its list position and its
    /// original offline id; otherwise the trip is appended with a freshly
    /// derived offline id. Either way the entry comes out `pending` with a
    /// fresh `last_modified`, because a save is a local change the server
    /// has not seen.
    pub fn save(&mut self, trip: Trip) -> Result<OfflineTrip> {
        let raw = trip.id.raw_id();
        let minted = mint_offline_id(&trip);
        let now = Utc::now();

        let existing = self
            .trips
            .iter()
            .position(|e| e.matches(&raw) || e.offline_id == minted);

        let entry = match existing {
            Some(i) => {
                let old = &self.trips[i];
                // Keep the server's id if the incoming copy lost it (a
                // re-normalized reply only carries the local id).
                let mut trip = trip;
                if trip.id.server_id().is_none() {
                    if let Some(server) = old.trip.id.server_id() {
                        trip.id = trip.id.with_server_id(server);
                    }
                }
                let entry = OfflineTrip {
                    trip,
                    offline_id: old.offline_id.clone(),
                    status: SyncStatus::Pending,
                    last_modified: now,
                    sync_attempts: 0,
                };
                self.trips[i] = entry.clone();
                entry
            }
            None => {
                let entry = OfflineTrip {
                    trip,
                    offline_id: minted,
                    status: SyncStatus::Pending,
                    last_modified: now,
                    sync_attempts: 0,
                };
                self.trips.push(entry.clone());
                entry
            }
        };

        self.persist()?;
        tracing::debug!(offline_id = %entry.offline_id, "trip saved offline");
        Ok(entry)
    }

    /// Remove the first entry matching `key`. Returns whether anything was
    /// removed.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        match self.trips.iter().position(|e| e.matches(key)) {
            Some(i) => {
                let removed = self.trips.remove(i);
                self.persist()?;
                tracing::debug!(offline_id = %removed.offline_id, "trip removed from store");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Transition an entry's status, refreshing `last_modified`. Returns
    /// whether a matching entry existed.
    pub fn update_status(&mut self, key: &str, status: SyncStatus) -> Result<bool> {
        match self.trips.iter_mut().find(|e| e.matches(key)) {
            Some(entry) => {
                entry.status = status;
                entry.last_modified = Utc::now();
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-arm a failed entry for another round of automatic sync.
    pub fn retry(&mut self, key: &str) -> Result<bool> {
        match self.trips.iter_mut().find(|e| e.matches(key)) {
            Some(entry) => {
                entry.status = SyncStatus::Pending;
                entry.sync_attempts = 0;
                entry.last_modified = Utc::now();
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Record a successful push: the server assigned `server_id`.
    ///
    /// `snapshot` is the entry's `last_modified` as it was when the push
    /// started. If the entry changed locally while the request was in
    /// flight, it stays `pending` (the server id is still recorded) so the
    /// next pass pushes the newer content. Returns `true` when the entry
    /// ended up `synced`.
    pub fn record_sync_success(
        &mut self,
        offline_id: &str,
        server_id: i64,
        snapshot: DateTime<Utc>,
    ) -> Result<bool> {
        let entry = self
            .trips
            .iter_mut()
            .find(|e| e.offline_id == offline_id)
            .ok_or_else(|| Error::TripNotFound(offline_id.to_string()))?;

        entry.trip.id = entry.trip.id.with_server_id(server_id);

        let synced = entry.last_modified == snapshot;
        if synced {
            entry.status = SyncStatus::Synced;
            entry.sync_attempts = 0;
        } else {
            tracing::info!(
                offline_id = %offline_id,
                "trip edited while push was in flight, keeping it pending"
            );
        }
        self.persist()?;
        Ok(synced)
    }

    /// Record a failed push attempt.
    pub fn record_sync_failure(&mut self, offline_id: &str) -> Result<()> {
        let entry = self
            .trips
            .iter_mut()
            .find(|e| e.offline_id == offline_id)
            .ok_or_else(|| Error::TripNotFound(offline_id.to_string()))?;

        entry.status = SyncStatus::Failed;
        entry.sync_attempts += 1;
        self.persist()
    }

    pub fn get(&self, key: &str) -> Option<&OfflineTrip> {
        self.trips.iter().find(|e| e.matches(key))
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All entries, in insertion order.
    pub fn trips(&self) -> &[OfflineTrip] {
        &self.trips
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Entries the next sync pass should push, in store order: everything
    /// `pending`, plus `failed` entries that have automatic attempts left.
    pub fn sync_queue(&self, max_attempts: u32) -> Vec<&OfflineTrip> {
        self.trips
            .iter()
            .filter(|e| match e.status {
                SyncStatus::Pending => true,
                SyncStatus::Failed => e.sync_attempts < max_attempts,
                SyncStatus::Synced => false,
            })
            .collect()
    }

    /// Count of entries per status, for status displays.
    pub fn status_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for e in &self.trips {
            match e.status {
                SyncStatus::Pending => counts.0 += 1,
                SyncStatus::Synced => counts.1 += 1,
                SyncStatus::Failed => counts.2 += 1,
            }
        }
        counts
    }

    /// Wipe the collection (logout / reset).
    pub fn clear(&mut self) -> Result<()> {
        self.trips.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let blob = TripsBlob {
            schema_version: SCHEMA_VERSION,
            trips: self.trips.clone(),
        };
        write_blob(path, &blob)
    }
}

/// Derive the local key for a trip: `offline-` plus the raw id, or plus a
/// timestamp for a degenerate blank id.
fn mint_offline_id(trip: &Trip) -> String {
    if trip.id.raw_id().is_empty() {
        format!("offline-{}", Utc::now().timestamp_millis())
    } else {
        trip.id.offline_id()
    }
}

fn load_trips_blob(path: &Path) -> Vec<OfflineTrip> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read trip store, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str::<TripsBlob>(&content) {
        Ok(blob) if blob.schema_version <= SCHEMA_VERSION => blob.trips,
        Ok(blob) => {
            tracing::warn!(
                found = blob.schema_version,
                supported = SCHEMA_VERSION,
                "trip store written by a newer version, starting empty"
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "trip store is corrupt, starting empty");
            Vec::new()
        }
    }
}

/// Write a blob atomically: temp file in the same directory, then rename.
pub(crate) fn write_blob<T: Serialize>(path: &Path, blob: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(blob)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ============================================
// Sync-state blob
// ============================================

/// Last-sync metadata, persisted separately from the collection so a sync
/// attempt that pushes nothing still leaves a trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// When a sync pass last started, successful or not
    pub last_sync_attempt: Option<DateTime<Utc>>,
}

/// Owner of the sync-state blob.
pub struct SyncStateStore {
    path: Option<PathBuf>,
    state: SyncState,
}

impl SyncStateStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let state = if path.exists() {
            load_sync_state(&path)
        } else {
            SyncState::default()
        };

        Ok(Self {
            path: Some(path),
            state,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: SyncState::default(),
        }
    }

    pub fn last_sync_attempt(&self) -> Option<DateTime<Utc>> {
        self.state.last_sync_attempt
    }

    pub fn record_attempt(&mut self, when: DateTime<Utc>) -> Result<()> {
        self.state.last_sync_attempt = Some(when);
        self.state.schema_version = SCHEMA_VERSION;
        if let Some(path) = &self.path {
            write_blob(path, &self.state)?;
        }
        Ok(())
    }
}

fn load_sync_state(path: &Path) -> SyncState {
    match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<SyncState>(&content).map_err(|e| e.to_string()))
    {
        Ok(state) if state.schema_version <= SCHEMA_VERSION => state,
        Ok(state) => {
            tracing::warn!(
                found = state.schema_version,
                supported = SCHEMA_VERSION,
                "sync state written by a newer version, starting fresh"
            );
            SyncState::default()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "sync state unreadable, starting fresh");
            SyncState::default()
        }
    }
}
