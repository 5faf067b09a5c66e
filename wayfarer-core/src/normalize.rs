//! Trip normalizer
//!
//! Turns a raw assistant reply (free prose that may embed trip JSON) into
//! canonical [`Trip`] values. The planning assistant is prompted to answer
//! with a JSON payload inside its prose, but nothing guarantees it does,
//! or that the payload is well formed. This module owns all of that
//! uncertainty so nothing downstream has to.
//!
//! # Error Handling
//!
//! The normalizer never returns an error and never panics, whatever the
//! input text:
//!
//! - **No JSON in the reply**: returns `None`, the "no trip data" signal.
//!   Callers treat the reply as plain conversation.
//!
//! - **Unbalanced or undecodable JSON**: logged at debug, returns `None`.
//!
//! - **A batch with some bad trips**: bad candidates are skipped with a
//!   debug log; the good ones still come through.
//!
//! - **Missing optional fields**: filled with defaults (`#[serde(default)]`
//!   on the raw mirror types, explicit fallbacks for geometry). Only `id`
//!   and `title` are required; a candidate missing those is dropped.
//!
//! - **Malformed coordinates**: a bad `mapCenter` falls back to the first
//!   marker, then the first segment point, then `(0, 0)`; bad markers are
//!   dropped individually; a polyline with any undecodable point is
//!   cleared so a half-missing route never draws as the wrong line.
//!
//! # Extraction
//!
//! Replies that are pure JSON (the whole text is one object or array) are
//! decoded directly. Otherwise the first top-level brace-delimited
//! substring is located by a balanced scan that respects string literals
//! and escapes, and decoded. Only that first candidate is considered.

use crate::types::{
    Activity, Bounds, Day, Journey, LngLat, Marker, RouteDetails, Segment, TravelMode, Trip,
    TripId,
};
use serde::Deserialize;
use serde_json::Value;

/// Normalize a full assistant reply into trips.
///
/// Returns `None` when the reply carries no usable trip data; that is a
/// normal outcome, not an error.
pub fn trips_from_text(text: &str) -> Option<Vec<Trip>> {
    let value = extract_json(text)?;
    let trips = trips_from_value(&value);
    if trips.is_empty() {
        tracing::debug!("reply contained JSON but no usable trips");
        None
    } else {
        Some(trips)
    }
}

/// Locate and decode the first JSON payload inside free text.
///
/// A reply that is entirely JSON decodes as-is (this is also the path for
/// files passed to `wayfarer import`). Otherwise the text is scanned for
/// the first balanced `{ ... }` group.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(value);
        }
    }

    let candidate = first_balanced_object(text)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "embedded JSON candidate did not decode");
            None
        }
    }
}

/// Find the first balanced top-level `{ ... }` substring.
///
/// Braces inside string literals do not count; escapes inside strings are
/// honored. Returns `None` when no opening brace exists or the first group
/// never closes.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    tracing::debug!("opening brace never balanced, treating as no trip data");
    None
}

/// Pull trips out of a decoded payload.
///
/// Accepted shapes: `{"trip": [...]}`, `{"trips": [...]}`, `{"trip": {...}}`,
/// a bare trip object, or a top-level array of trips. Anything else yields
/// an empty list.
pub fn trips_from_value(value: &Value) -> Vec<Trip> {
    let candidates: Vec<&Value> = match value {
        Value::Object(map) => {
            if let Some(inner) = map.get("trip").or_else(|| map.get("trips")) {
                match inner {
                    Value::Array(items) => items.iter().collect(),
                    Value::Object(_) => vec![inner],
                    _ => Vec::new(),
                }
            } else if map.contains_key("title") {
                // A bare trip object
                vec![value]
            } else {
                Vec::new()
            }
        }
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    candidates
        .into_iter()
        .filter_map(|candidate| {
            let raw: RawTrip = match serde_json::from_value(candidate.clone()) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!(error = %e, "trip candidate is not an object, skipping");
                    return None;
                }
            };
            raw_to_trip(raw)
        })
        .collect()
}

// ============================================
// Raw payload types (serde deserialization)
// ============================================

/// A trip as the assistant wrote it, before any validation.
///
/// Every field is optional and loosely typed; `#[serde(default)]` keeps a
/// missing or mistyped sibling from sinking the candidate.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawTrip {
    id: Option<Value>,
    title: Option<String>,
    description: Option<String>,
    location: Option<String>,
    duration: Option<Value>,
    difficulty: Option<String>,
    price_estimate: Option<Value>,
    why_we_chose_this: Option<String>,
    map_center: Option<Value>,
    markers: Option<Vec<Value>>,
    journey: Option<RawJourney>,
    itinerary: Option<Vec<RawDay>>,
    activities: Option<Vec<RawActivity>>,
    suggested_guides: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawJourney {
    segments: Option<Vec<RawSegment>>,
    total_distance: Option<Value>,
    total_duration: Option<Value>,
    bounds: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawSegment {
    mode: Option<String>,
    from: Option<String>,
    to: Option<String>,
    distance: Option<Value>,
    duration: Option<Value>,
    terrain: Option<String>,
    geometry: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawDay {
    day: Option<Value>,
    title: Option<String>,
    description: Option<String>,
    activities: Option<Vec<Value>>,
    accommodation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawActivity {
    day: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
    difficulty: Option<String>,
    duration_hours: Option<Value>,
    start_location: Option<String>,
    end_location: Option<String>,
    highlights: Option<Vec<Value>>,
    hazards: Option<Vec<Value>>,
    route: Option<RawRouteDetails>,
    geometry: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRouteDetails {
    distance_km: Option<Value>,
    elevation_gain_m: Option<Value>,
    elevation_loss_m: Option<Value>,
    high_point_m: Option<Value>,
    terrain: Option<String>,
    route_type: Option<String>,
}

// ============================================
// Raw -> canonical conversion
// ============================================

/// Convert one raw candidate, or decide it cannot be a trip.
fn raw_to_trip(raw: RawTrip) -> Option<Trip> {
    let id = match trip_id_from_value(raw.id.as_ref()) {
        Some(id) => id,
        None => {
            tracing::debug!("trip candidate has no usable id, skipping");
            return None;
        }
    };

    let title = match raw.title {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            tracing::debug!(id = %id, "trip candidate has no title, skipping");
            return None;
        }
    };

    let markers: Vec<Marker> = raw
        .markers
        .unwrap_or_default()
        .iter()
        .filter_map(marker_from_value)
        .collect();

    let journey = raw.journey.map(normalize_journey).unwrap_or_default();

    // mapCenter fallback chain: first marker, then first routed point.
    let map_center = raw
        .map_center
        .as_ref()
        .and_then(coord_from_value)
        .or_else(|| markers.first().map(|m| m.coordinates))
        .or_else(|| {
            journey
                .segments
                .iter()
                .find_map(|s| s.geometry.first())
                .copied()
        })
        .unwrap_or_default();

    let itinerary = raw
        .itinerary
        .unwrap_or_default()
        .into_iter()
        .map(normalize_day)
        .collect();

    let activities = raw
        .activities
        .unwrap_or_default()
        .into_iter()
        .map(normalize_activity)
        .collect();

    Some(Trip {
        id,
        title,
        description: raw.description.unwrap_or_default(),
        location: raw.location.unwrap_or_default(),
        duration: raw.duration.as_ref().and_then(text_from_value).unwrap_or_default(),
        difficulty: raw.difficulty.unwrap_or_default(),
        price_estimate: raw
            .price_estimate
            .as_ref()
            .and_then(text_from_value)
            .unwrap_or_default(),
        why_we_chose_this: raw.why_we_chose_this.unwrap_or_default(),
        map_center,
        markers,
        journey,
        itinerary,
        activities,
        suggested_guides: strings_from_values(raw.suggested_guides),
    })
}

fn normalize_journey(raw: RawJourney) -> Journey {
    let segments: Vec<Segment> = raw
        .segments
        .unwrap_or_default()
        .into_iter()
        .map(normalize_segment)
        .collect();

    // Totals: trust the reply when it gives numbers, otherwise sum what we
    // have so aggregates are never silently zero for a routed journey.
    let total_distance = raw
        .total_distance
        .as_ref()
        .and_then(num_from_value)
        .map(clamp_non_negative)
        .unwrap_or_else(|| segments.iter().map(|s| s.distance).sum());
    let total_duration = raw
        .total_duration
        .as_ref()
        .and_then(num_from_value)
        .map(clamp_non_negative)
        .unwrap_or_else(|| segments.iter().map(|s| s.duration).sum());

    let bounds = raw.bounds.as_ref().and_then(bounds_from_value);

    Journey {
        segments,
        total_distance,
        total_duration,
        bounds,
    }
}

fn normalize_segment(raw: RawSegment) -> Segment {
    Segment {
        mode: raw.mode.map(TravelMode::from).unwrap_or_default(),
        from: raw.from.unwrap_or_default(),
        to: raw.to.unwrap_or_default(),
        distance: raw
            .distance
            .as_ref()
            .and_then(num_from_value)
            .map(clamp_non_negative)
            .unwrap_or(0.0),
        duration: raw
            .duration
            .as_ref()
            .and_then(num_from_value)
            .map(clamp_non_negative)
            .unwrap_or(0.0),
        terrain: raw.terrain,
        geometry: raw
            .geometry
            .as_ref()
            .map(polyline_from_value)
            .unwrap_or_default(),
    }
}

fn normalize_day(raw: RawDay) -> Day {
    Day {
        day: raw.day.as_ref().and_then(day_number_from_value).unwrap_or(0),
        title: raw.title.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
        activities: strings_from_values(raw.activities),
        accommodation: raw.accommodation,
    }
}

fn normalize_activity(raw: RawActivity) -> Activity {
    Activity {
        day: raw.day.as_ref().and_then(day_number_from_value).unwrap_or(0),
        kind: raw.kind.unwrap_or_default(),
        difficulty: raw.difficulty,
        duration_hours: raw
            .duration_hours
            .as_ref()
            .and_then(num_from_value)
            .map(clamp_non_negative),
        start_location: raw.start_location,
        end_location: raw.end_location,
        highlights: strings_from_values(raw.highlights),
        hazards: strings_from_values(raw.hazards),
        route: raw.route.map(normalize_route_details),
        geometry: raw
            .geometry
            .as_ref()
            .map(polyline_from_value)
            .unwrap_or_default(),
    }
}

fn normalize_route_details(raw: RawRouteDetails) -> RouteDetails {
    RouteDetails {
        distance_km: raw.distance_km.as_ref().and_then(num_from_value),
        elevation_gain_m: raw.elevation_gain_m.as_ref().and_then(num_from_value),
        elevation_loss_m: raw.elevation_loss_m.as_ref().and_then(num_from_value),
        high_point_m: raw.high_point_m.as_ref().and_then(num_from_value),
        terrain: raw.terrain,
        route_type: raw.route_type,
    }
}

// ============================================
// Value-level helpers
// ============================================

/// A non-empty string becomes a local id; an integer is a server id.
fn trip_id_from_value(value: Option<&Value>) -> Option<TripId> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(TripId::Local(s.clone())),
        Value::Number(n) => n.as_i64().map(TripId::Remote),
        _ => None,
    }
}

/// Decode a coordinate pair from either `[lng, lat]` or an object with
/// `lng`/`lat` (or `longitude`/`latitude`) keys. Replies use both.
fn coord_from_value(value: &Value) -> Option<LngLat> {
    let (lng, lat) = match value {
        Value::Array(items) if items.len() >= 2 => {
            (items[0].as_f64()?, items[1].as_f64()?)
        }
        Value::Object(map) => {
            let lng = map
                .get("lng")
                .or_else(|| map.get("lon"))
                .or_else(|| map.get("longitude"))?
                .as_f64()?;
            let lat = map.get("lat").or_else(|| map.get("latitude"))?.as_f64()?;
            (lng, lat)
        }
        _ => return None,
    };

    let coord = LngLat::new(lng, lat);
    coord.is_valid().then_some(coord)
}

/// Decode an ordered polyline. Any undecodable point clears the whole
/// line: a route with silently missing points would draw wrong.
fn polyline_from_value(value: &Value) -> Vec<LngLat> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    let mut points = Vec::with_capacity(items.len());
    for item in items {
        match coord_from_value(item) {
            Some(coord) => points.push(coord),
            None => {
                tracing::debug!("polyline contains an undecodable point, dropping geometry");
                return Vec::new();
            }
        }
    }
    points
}

/// Bounds are `[southwest, northeast]`; anything else becomes `None`.
fn bounds_from_value(value: &Value) -> Option<Bounds> {
    let Value::Array(items) = value else {
        return None;
    };
    if items.len() != 2 {
        return None;
    }
    Some(Bounds(
        coord_from_value(&items[0])?,
        coord_from_value(&items[1])?,
    ))
}

fn marker_from_value(value: &Value) -> Option<Marker> {
    let map = value.as_object()?;
    let coordinates = coord_from_value(map.get("coordinates")?)?;
    let label = map
        .get("label")
        .and_then(text_from_value)
        .unwrap_or_default();
    Some(Marker { coordinates, label })
}

/// Accept a number written as a number or as a numeric string.
fn num_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Day numbers arrive as numbers or numeric strings; negatives are junk.
fn day_number_from_value(value: &Value) -> Option<u32> {
    let n = num_from_value(value)?;
    if n < 0.0 {
        return None;
    }
    Some(n as u32)
}

/// Render a scalar as display text ("5 days", 1200 -> "1200").
fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn strings_from_values(values: Option<Vec<Value>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .iter()
        .filter_map(text_from_value)
        .collect()
}

fn clamp_non_negative(n: f64) -> f64 {
    if n < 0.0 {
        0.0
    } else {
        n
    }
}
