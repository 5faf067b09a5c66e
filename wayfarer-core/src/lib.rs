//! # wayfarer-core
//!
//! Core library for wayfarer - an offline-first trip planning companion.
//!
//! This library provides:
//! - Domain types for trips, journeys, and itineraries
//! - A defensive normalizer for assistant reply text
//! - Offline trip storage with sync bookkeeping
//! - A sync coordinator that pushes local trips to the remote collection
//! - Read-only view models for map, itinerary, and timeline rendering
//!
//! ## Architecture
//!
//! A trip flows through three stages:
//! - **Reply text:** Free-form assistant output, mined for trip JSON by the
//!   normalizer (lossy by design: defective candidates are skipped)
//! - **Offline store:** Normalized trips persisted locally with sync status
//!   and a client-generated identity
//! - **Remote collection:** Server copies created by the sync coordinator,
//!   which promotes local identities to server-assigned ids
//!
//! ## Example
//!
//! ```rust,no_run
//! use wayfarer_core::{normalize, Config, OfflineTripStore};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open the offline store and save whatever the reply contained
//! let mut store = OfflineTripStore::open(config.trips_path()).expect("failed to open store");
//! if let Some(trips) = normalize::trips_from_text("... assistant reply ...") {
//!     for trip in trips {
//!         store.save(trip).expect("failed to save trip");
//!     }
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use store::{OfflineTripStore, SyncStateStore};
pub use sync::{DeleteOutcome, RemoteTrips, SyncCoordinator, SyncOutcome};
pub use types::*;

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod store;
pub mod sync;
pub mod types;
pub mod views;
