//! HTTP client for the map services
//!
//! Two concerns share this client: the directions proxy (server-side
//! routing so provider keys stay off the client) and the public map
//! config, which hands out the token browsers and tools need to render
//! tiles.

use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{LngLat, TravelMode};

use super::{base_url, build_http_client, error_from_response};

/// A routed line between waypoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGeometry {
    /// Ordered `[lng, lat]` points of the route
    pub geometry: Vec<LngLat>,
    /// Route length in meters
    pub distance: f64,
    /// Travel time in seconds
    pub duration: f64,
}

/// Response from GET /config
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    /// Public token for the tile provider
    pub mapbox_token: String,
}

/// HTTP client for the directions proxy and map config
pub struct MapsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MapsClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;
        let base_url = base_url(&config)?;
        let http_client = build_http_client(&config)?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Route between waypoints using the given travel mode.
    ///
    /// Only modes with a routing profile can be routed; flights, ferries
    /// and the open-set rest are validation errors, since the caller is in
    /// a position to not ask.
    pub async fn directions(
        &self,
        mode: &TravelMode,
        waypoints: &[LngLat],
    ) -> Result<RouteGeometry> {
        let profile = mode.directions_profile().ok_or_else(|| Error::Validation {
            message: format!("travel mode {} is not routable", mode),
            fields: vec!["profile".to_string()],
        })?;

        if waypoints.len() < 2 {
            return Err(Error::Validation {
                message: "directions need at least two waypoints".to_string(),
                fields: vec!["coordinates".to_string()],
            });
        }

        let coordinates = waypoints
            .iter()
            .map(|p| format!("{},{}", p.lng(), p.lat()))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/directions?profile={}&coordinates={}",
            self.base_url,
            profile,
            urlencoding::encode(&coordinates)
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("HTTP request failed: {}", e)))?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Http(format!("failed to parse response: {}", e)))
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Fetch the public map configuration
    pub async fn map_config(&self) -> Result<MapConfig> {
        let url = format!("{}/config", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("HTTP request failed: {}", e)))?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Http(format!("failed to parse response: {}", e)))
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unroutable_mode_is_a_validation_error() {
        let config = ApiConfig {
            server_url: Some("https://trips.example.com".to_string()),
            ..Default::default()
        };
        let client = MapsClient::new(config).unwrap();
        let points = [LngLat::new(6.87, 45.92), LngLat::new(7.75, 46.02)];

        let err = client
            .directions(&TravelMode::Flight, &points)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_directions_need_two_waypoints() {
        let config = ApiConfig {
            server_url: Some("https://trips.example.com".to_string()),
            ..Default::default()
        };
        let client = MapsClient::new(config).unwrap();

        let err = client
            .directions(&TravelMode::Walking, &[LngLat::new(6.87, 45.92)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
