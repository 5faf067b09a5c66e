//! Core domain types for wayfarer
//!
//! These types represent the canonical trip model that every other layer
//! works in terms of: the normalizer produces it, the offline store and the
//! remote trip service persist it, and the presentation contracts derive
//! from it.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Trip** | A complete plan for one adventure: narrative fields, map geometry, itinerary |
//! | **Journey** | The ordered travel legs of a Trip plus aggregate distance/duration and bounds |
//! | **Segment** | One leg between two named places, with a travel mode and optional polyline |
//! | **Day** | One itinerary entry: title, description, activity strings, accommodation |
//! | **Activity** | Richer per-day entry with difficulty, duration, highlights/hazards, route details |
//! | **Offline id** | Local lookup key, `"offline-" + id`; stays valid after the server assigns an id |
//! | **Pending / Synced / Failed** | Sync lifecycle of a locally saved trip |
//!
//! ### Trip identity
//!
//! A trip can be known by two keys at once: the id the server assigned when
//! it was created remotely (an integer), and the id it carried locally
//! before that (a string, either provided by the assistant reply or derived
//! from a timestamp). [`TripId`] makes the three possible states explicit:
//!
//! - [`TripId::Local`] - only a client-side id exists
//! - [`TripId::Remote`] - only a server id exists (e.g. fetched from the API)
//! - [`TripId::Both`] - created locally, later acknowledged by the server
//!
//! All lookups go through [`TripId::matches`], the single place the
//! dual-key rule lives: a query key matches when it equals the raw id, or
//! when `"offline-" + key` equals the derived offline id, or when the key
//! already is the offline id. Nothing else in the codebase compares trip
//! ids by hand.
//!
//! ### Units
//!
//! Segment `distance` is meters and `duration` is seconds; [`RouteDetails`]
//! carries kilometers and meters as its field names say. Coordinates are
//! always `[longitude, latitude]`, matching the wire format of the map
//! services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Coordinates
// ============================================

/// A longitude/latitude pair, serialized as a two-element array
/// `[lng, lat]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LngLat(pub f64, pub f64);

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self(lng, lat)
    }

    pub fn lng(&self) -> f64 {
        self.0
    }

    pub fn lat(&self) -> f64 {
        self.1
    }

    /// True when both components are plausible WGS84 degrees.
    pub fn is_valid(&self) -> bool {
        self.0.is_finite()
            && self.1.is_finite()
            && (-180.0..=180.0).contains(&self.0)
            && (-90.0..=90.0).contains(&self.1)
    }
}

/// A bounding box as `[southwest, northeast]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds(pub LngLat, pub LngLat);

impl Bounds {
    pub fn southwest(&self) -> LngLat {
        self.0
    }

    pub fn northeast(&self) -> LngLat {
        self.1
    }

    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn around(points: &[LngLat]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_lng, mut min_lat) = (first.lng(), first.lat());
        let (mut max_lng, mut max_lat) = (first.lng(), first.lat());
        for p in &points[1..] {
            min_lng = min_lng.min(p.lng());
            min_lat = min_lat.min(p.lat());
            max_lng = max_lng.max(p.lng());
            max_lat = max_lat.max(p.lat());
        }
        Some(Bounds(
            LngLat::new(min_lng, min_lat),
            LngLat::new(max_lng, max_lat),
        ))
    }
}

/// A labeled point of interest on the trip map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Position as `[lng, lat]`
    pub coordinates: LngLat,
    /// Display label ("Basecamp", "Trailhead", ...)
    pub label: String,
}

// ============================================
// Travel Modes
// ============================================

/// How a journey segment is traveled.
///
/// This is an open set: assistant replies routinely invent modes
/// ("packraft", "gondola"), and those survive as [`TravelMode::Other`]
/// rather than being rejected or collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TravelMode {
    Walking,
    Hiking,
    Driving,
    Cycling,
    Transit,
    Flight,
    Ferry,
    Train,
    /// Any mode we do not recognize; the original string is preserved
    Other(String),
}

impl TravelMode {
    pub fn as_str(&self) -> &str {
        match self {
            TravelMode::Walking => "walking",
            TravelMode::Hiking => "hiking",
            TravelMode::Driving => "driving",
            TravelMode::Cycling => "cycling",
            TravelMode::Transit => "transit",
            TravelMode::Flight => "flight",
            TravelMode::Ferry => "ferry",
            TravelMode::Train => "train",
            TravelMode::Other(s) => s,
        }
    }

    /// The routing profile the directions proxy understands, if any.
    pub fn directions_profile(&self) -> Option<&'static str> {
        match self {
            TravelMode::Walking | TravelMode::Hiking => Some("walking"),
            TravelMode::Driving => Some("driving"),
            TravelMode::Cycling => Some("cycling"),
            _ => None,
        }
    }
}

impl Default for TravelMode {
    fn default() -> Self {
        TravelMode::Walking
    }
}

impl From<String> for TravelMode {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "walking" | "walk" => TravelMode::Walking,
            "hiking" | "hike" | "trekking" => TravelMode::Hiking,
            "driving" | "drive" | "car" => TravelMode::Driving,
            "cycling" | "cycle" | "biking" | "bike" => TravelMode::Cycling,
            "transit" | "bus" => TravelMode::Transit,
            "flight" | "flying" | "plane" => TravelMode::Flight,
            "ferry" | "boat" => TravelMode::Ferry,
            "train" | "rail" => TravelMode::Train,
            _ => TravelMode::Other(s),
        }
    }
}

impl From<TravelMode> for String {
    fn from(mode: TravelMode) -> Self {
        mode.as_str().to_string()
    }
}

impl std::fmt::Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Journey
// ============================================

/// One leg of the journey between two named places.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// How this leg is traveled
    #[serde(default)]
    pub mode: TravelMode,
    /// Starting place label
    #[serde(default)]
    pub from: String,
    /// Destination place label
    #[serde(default)]
    pub to: String,
    /// Length in meters; 0 when the reply did not provide one
    #[serde(default)]
    pub distance: f64,
    /// Travel time in seconds; 0 when the reply did not provide one
    #[serde(default)]
    pub duration: f64,
    /// Surface/terrain note ("gravel", "exposed ridge")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<String>,
    /// Route polyline as ordered `[lng, lat]` points; empty when absent
    #[serde(default)]
    pub geometry: Vec<LngLat>,
}

impl Segment {
    /// The polyline, but only when it can actually be drawn (two or more
    /// points). Single-point and empty geometries render as markers only.
    pub fn renderable_geometry(&self) -> Option<&[LngLat]> {
        if self.geometry.len() >= 2 {
            Some(&self.geometry)
        } else {
            None
        }
    }
}

/// The ordered segments of a trip plus aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Sum of segment lengths in meters
    #[serde(default)]
    pub total_distance: f64,
    /// Sum of segment durations in seconds
    #[serde(default)]
    pub total_duration: f64,
    /// Map bounds as `[southwest, northeast]`, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

// ============================================
// Itinerary
// ============================================

/// One day card of the itinerary.
///
/// Day numbers are taken as-is from the reply: they are not required to be
/// contiguous or unique, and nothing here enforces that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    #[serde(default)]
    pub day: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Plain activity strings for this day
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation: Option<String>,
}

/// Structured route facts for an [`Activity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetails {
    /// Route length in kilometers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// Total ascent in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_gain_m: Option<f64>,
    /// Total descent in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_loss_m: Option<f64>,
    /// Highest point in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_point_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<String>,
    /// "out-and-back", "loop", "point-to-point"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_type: Option<String>,
}

/// A richer, optional alternative to the plain [`Day`] strings: one
/// concrete undertaking on a given day, with enough structure to build a
/// timeline from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Which itinerary day this belongs to
    #[serde(default)]
    pub day: u32,
    /// What kind of undertaking ("summit hike", "rest day")
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    /// Expected length in hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_location: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub hazards: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteDetails>,
    /// Optional polyline for just this activity
    #[serde(default)]
    pub geometry: Vec<LngLat>,
}

// ============================================
// Trip Identity
// ============================================

/// The identity of a trip across its local and remote lives.
///
/// Serialized as the server id (JSON number) when one exists, else as the
/// local string id; deserialization maps numbers to [`TripId::Remote`] and
/// strings to [`TripId::Local`]. The local half of a [`TripId::Both`] is
/// carried by the offline store entry, so nothing is lost on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripId {
    /// Client-generated id, before the server has seen the trip
    Local(String),
    /// Server-assigned id
    Remote(i64),
    /// Created locally, later acknowledged by the server; both keys resolve
    Both { server: i64, local: String },
}

impl TripId {
    pub fn server_id(&self) -> Option<i64> {
        match self {
            TripId::Local(_) => None,
            TripId::Remote(server) | TripId::Both { server, .. } => Some(*server),
        }
    }

    pub fn local_id(&self) -> Option<&str> {
        match self {
            TripId::Local(local) | TripId::Both { local, .. } => Some(local),
            TripId::Remote(_) => None,
        }
    }

    /// The raw key: the server id when one exists, else the local id.
    pub fn raw_id(&self) -> String {
        match self {
            TripId::Local(local) => local.clone(),
            TripId::Remote(server) | TripId::Both { server, .. } => server.to_string(),
        }
    }

    /// The derived offline key. Local ids minted by the store already carry
    /// the `offline-` prefix and are returned untouched; everything else
    /// gets prefixed.
    pub fn offline_id(&self) -> String {
        match self {
            TripId::Local(local) | TripId::Both { local, .. } => {
                if local.starts_with("offline-") {
                    local.clone()
                } else {
                    format!("offline-{}", local)
                }
            }
            TripId::Remote(server) => format!("offline-{}", server),
        }
    }

    /// The one place the dual-key rule lives: `key` matches when it equals
    /// a raw id, equals the derived offline id, or when prefixing it with
    /// `offline-` produces the offline id.
    pub fn matches(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        let offline = self.offline_id();
        if offline == key || offline == format!("offline-{}", key) {
            return true;
        }
        match self {
            TripId::Local(local) => local == key,
            TripId::Remote(server) => server.to_string() == key,
            TripId::Both { server, local } => local == key || server.to_string() == key,
        }
    }

    /// Record the id the server assigned, keeping the local key valid.
    pub fn with_server_id(&self, server: i64) -> TripId {
        match self {
            TripId::Local(local) => TripId::Both {
                server,
                local: local.clone(),
            },
            TripId::Remote(_) => TripId::Remote(server),
            TripId::Both { local, .. } => TripId::Both {
                server,
                local: local.clone(),
            },
        }
    }
}

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw_id())
    }
}

impl Serialize for TripId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.server_id() {
            Some(server) => serializer.serialize_i64(server),
            None => serializer.serialize_str(&self.raw_id()),
        }
    }
}

impl<'de> Deserialize<'de> for TripId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(TripId::Remote)
                .ok_or_else(|| D::Error::custom(format!("trip id out of range: {}", n))),
            serde_json::Value::String(s) => Ok(TripId::Local(s)),
            other => Err(D::Error::custom(format!(
                "trip id must be a number or string, got {}",
                other
            ))),
        }
    }
}

// ============================================
// Trip
// ============================================

/// The canonical trip model.
///
/// Every field except `id` and `title` is optional on the wire; the
/// normalizer fills in defaults so downstream code never deals with
/// missing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    /// Human-readable length ("5 days")
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub difficulty: String,
    /// Free-form ("$1,200 - $1,800 per person")
    #[serde(default)]
    pub price_estimate: String,
    /// The pitch: why this trip fits the request
    #[serde(default)]
    pub why_we_chose_this: String,
    /// Initial map center as `[lng, lat]`
    #[serde(default)]
    pub map_center: LngLat,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub journey: Journey,
    #[serde(default)]
    pub itinerary: Vec<Day>,
    /// Richer per-day structure; empty when the reply only gave day strings
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub suggested_guides: Vec<String>,
}

// ============================================
// Sync Status
// ============================================

/// Where a locally saved trip stands with the remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Saved locally, not yet accepted by the server
    Pending,
    /// The server has acknowledged this trip
    Synced,
    /// The last push attempt failed; see the sync log for why
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(format!("unknown sync status: {}", s)),
        }
    }
}

// ============================================
// Offline Trip
// ============================================

/// A trip as the offline store holds it: the trip itself plus the local
/// bookkeeping the sync loop needs. Serialized flat, so the blob reads as
/// a trip with extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTrip {
    #[serde(flatten)]
    pub trip: Trip,
    /// Local lookup key, always `offline-` prefixed
    pub offline_id: String,
    pub status: SyncStatus,
    /// Last local mutation; the sync loop uses this to detect edits that
    /// landed while a push was in flight
    pub last_modified: DateTime<Utc>,
    /// Push attempts so far; reset by a manual retry
    #[serde(default)]
    pub sync_attempts: u32,
}

impl OfflineTrip {
    /// Dual-key lookup across both the trip id and the stored offline id.
    pub fn matches(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        self.trip.id.matches(key)
            || self.offline_id == key
            || self.offline_id == format!("offline-{}", key)
    }

    /// The key to show in listings: the server id once synced, else the
    /// offline id.
    pub fn display_id(&self) -> String {
        match self.trip.id.server_id() {
            Some(server) => server.to_string(),
            None => self.offline_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_trip(id: TripId) -> Trip {
        Trip {
            id,
            title: "Test".to_string(),
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

    #[test]
    fn trip_id_matches_raw_and_offline_forms() {
        let local = TripId::Local("x1".to_string());
        assert!(local.matches("x1"));
        assert!(local.matches("offline-x1"));
        assert!(!local.matches("x2"));
        assert!(!local.matches(""));

        let remote = TripId::Remote(42);
        assert!(remote.matches("42"));
        assert!(remote.matches("offline-42"));
        assert!(!remote.matches("43"));

        let both = TripId::Both {
            server: 42,
            local: "offline-1700000000000".to_string(),
        };
        assert!(both.matches("42"));
        assert!(both.matches("offline-1700000000000"));
        assert!(both.matches("1700000000000"));
    }

    #[test]
    fn offline_id_never_double_prefixes() {
        let id = TripId::Local("offline-1700000000000".to_string());
        assert_eq!(id.offline_id(), "offline-1700000000000");

        let id = TripId::Local("x1".to_string());
        assert_eq!(id.offline_id(), "offline-x1");

        let id = TripId::Remote(7);
        assert_eq!(id.offline_id(), "offline-7");
    }

    #[test]
    fn with_server_id_promotes_local_to_both() {
        let id = TripId::Local("x1".to_string());
        let promoted = id.with_server_id(42);
        assert_eq!(promoted.server_id(), Some(42));
        assert_eq!(promoted.local_id(), Some("x1"));
        // The old local key still resolves
        assert!(promoted.matches("x1"));
        assert!(promoted.matches("42"));
    }

    #[test]
    fn trip_id_serde_forms() {
        let remote: TripId = serde_json::from_str("42").unwrap();
        assert_eq!(remote, TripId::Remote(42));

        let local: TripId = serde_json::from_str("\"x1\"").unwrap();
        assert_eq!(local, TripId::Local("x1".to_string()));

        let both = TripId::Both {
            server: 42,
            local: "x1".to_string(),
        };
        assert_eq!(serde_json::to_string(&both).unwrap(), "42");
        assert_eq!(
            serde_json::to_string(&TripId::Local("x1".into())).unwrap(),
            "\"x1\""
        );
    }

    #[test]
    fn travel_mode_open_set() {
        assert_eq!(TravelMode::from("Hiking".to_string()), TravelMode::Hiking);
        assert_eq!(TravelMode::from("bike".to_string()), TravelMode::Cycling);
        assert_eq!(
            TravelMode::from("packraft".to_string()),
            TravelMode::Other("packraft".to_string())
        );
        assert_eq!(
            TravelMode::Other("packraft".to_string()).as_str(),
            "packraft"
        );
    }

    #[test]
    fn renderable_geometry_needs_two_points() {
        let mut segment = Segment::default();
        assert!(segment.renderable_geometry().is_none());

        segment.geometry.push(LngLat::new(7.0, 46.0));
        assert!(segment.renderable_geometry().is_none());

        segment.geometry.push(LngLat::new(7.1, 46.1));
        assert_eq!(segment.renderable_geometry().map(|g| g.len()), Some(2));
    }

    #[test]
    fn bounds_around_points() {
        let points = vec![
            LngLat::new(7.0, 46.0),
            LngLat::new(7.5, 45.5),
            LngLat::new(6.5, 46.5),
        ];
        let bounds = Bounds::around(&points).unwrap();
        assert_eq!(bounds.southwest(), LngLat::new(6.5, 45.5));
        assert_eq!(bounds.northeast(), LngLat::new(7.5, 46.5));
        assert!(Bounds::around(&[]).is_none());
    }

    #[test]
    fn offline_trip_matches_either_key() {
        let entry = OfflineTrip {
            trip: minimal_trip(TripId::Local("x1".to_string())),
            offline_id: "offline-x1".to_string(),
            status: SyncStatus::Pending,
            last_modified: Utc::now(),
            sync_attempts: 0,
        };
        assert!(entry.matches("x1"));
        assert!(entry.matches("offline-x1"));
        assert!(!entry.matches("x2"));
    }
}
