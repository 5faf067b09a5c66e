//! Read-only view models derived from a [`Trip`]
//!
//! Everything here is a pure projection: build it from `&Trip`, render it,
//! throw it away. Presentation state (card disclosure) lives on the view,
//! never on the trip, so deriving a view twice from the same trip always
//! starts from the same place.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{Activity, Bounds, LngLat, Marker, Trip, TravelMode};

// ============================================
// Map view
// ============================================

/// One drawable polyline, taken from a journey segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLine {
    pub mode: TravelMode,
    pub from: String,
    pub to: String,
    /// At least two points, by construction
    pub points: Vec<LngLat>,
}

/// Everything the map needs to draw one trip.
///
/// Segments without a renderable polyline contribute no route line; their
/// endpoints still show up through the trip's markers. A trip with no
/// geometry at all still produces a valid (empty) view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub center: LngLat,
    pub markers: Vec<Marker>,
    pub routes: Vec<RouteLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl MapView {
    pub fn from_trip(trip: &Trip) -> Self {
        let routes: Vec<RouteLine> = trip
            .journey
            .segments
            .iter()
            .filter_map(|segment| {
                segment.renderable_geometry().map(|points| RouteLine {
                    mode: segment.mode.clone(),
                    from: segment.from.clone(),
                    to: segment.to.clone(),
                    points: points.to_vec(),
                })
            })
            .collect();

        // Prefer the bounds the reply gave us; otherwise fit around
        // everything we are going to draw.
        let bounds = trip.journey.bounds.or_else(|| {
            let mut points: Vec<LngLat> =
                trip.markers.iter().map(|m| m.coordinates).collect();
            for route in &routes {
                points.extend_from_slice(&route.points);
            }
            Bounds::around(&points)
        });

        Self {
            center: trip.map_center,
            markers: trip.markers.clone(),
            routes,
            bounds,
        }
    }

    /// True when there is nothing to draw beyond the bare map.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.routes.is_empty()
    }
}

// ============================================
// Itinerary view
// ============================================

/// One day card, with its disclosure state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCard {
    pub day: u32,
    pub title: String,
    pub description: String,
    pub activities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accommodation: Option<String>,
    /// Disclosure state; starts collapsed
    pub expanded: bool,
}

/// The day-by-day panel: cards in itinerary order plus guide suggestions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryView {
    pub days: Vec<DayCard>,
    pub suggested_guides: Vec<String>,
}

impl ItineraryView {
    pub fn from_trip(trip: &Trip) -> Self {
        let days = trip
            .itinerary
            .iter()
            .map(|day| DayCard {
                day: day.day,
                title: day.title.clone(),
                description: day.description.clone(),
                activities: day.activities.clone(),
                accommodation: day.accommodation.clone(),
                expanded: false,
            })
            .collect();
        Self {
            days,
            suggested_guides: trip.suggested_guides.clone(),
        }
    }

    /// Flip the disclosure of every card with this day number. Returns
    /// whether any card matched. Day numbers are not required to be unique,
    /// so duplicates toggle together.
    pub fn toggle_day(&mut self, day: u32) -> bool {
        let mut matched = false;
        for card in self.days.iter_mut().filter(|c| c.day == day) {
            card.expanded = !card.expanded;
            matched = true;
        }
        matched
    }
}

// ============================================
// Timeline view
// ============================================

/// The structured activities of one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayActivities {
    pub day: u32,
    pub activities: Vec<Activity>,
}

/// One day of the fallback timeline, straight from the itinerary strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleDay {
    pub day: u32,
    pub title: String,
    pub activities: Vec<String>,
}

/// The trip as a chronological sequence of days.
///
/// Built from the rich [`Activity`] list when the trip has one, grouped by
/// day number ascending (duplicate numbers merge, gaps stay gaps). Trips
/// that only carry plain itinerary strings fall back to those, in itinerary
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "days", rename_all = "lowercase")]
pub enum TimelineView {
    Structured(Vec<DayActivities>),
    Simple(Vec<SimpleDay>),
}

impl TimelineView {
    pub fn from_trip(trip: &Trip) -> Self {
        if trip.activities.is_empty() {
            return TimelineView::Simple(
                trip.itinerary
                    .iter()
                    .map(|day| SimpleDay {
                        day: day.day,
                        title: day.title.clone(),
                        activities: day.activities.clone(),
                    })
                    .collect(),
            );
        }

        let mut by_day: BTreeMap<u32, Vec<Activity>> = BTreeMap::new();
        for activity in &trip.activities {
            by_day.entry(activity.day).or_default().push(activity.clone());
        }
        TimelineView::Structured(
            by_day
                .into_iter()
                .map(|(day, activities)| DayActivities { day, activities })
                .collect(),
        )
    }

    pub fn day_count(&self) -> usize {
        match self {
            TimelineView::Structured(days) => days.len(),
            TimelineView::Simple(days) => days.len(),
        }
    }
}
