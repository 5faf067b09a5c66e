//! HTTP client for the weather proxy
//!
//! The backend proxies a weather provider so clients never hold provider
//! keys. Two endpoints: current conditions and a short daily forecast,
//! both keyed by coordinates.

use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::LngLat;

use super::{base_url, build_http_client, error_from_response};

/// Current conditions at a point
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    /// Air temperature in Celsius
    pub temperature_c: f64,
    /// Short description ("clear", "light snow")
    pub conditions: String,
    #[serde(default)]
    pub wind_speed_kmh: Option<f64>,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
}

/// One day of forecast
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastEntry {
    /// ISO date ("2026-03-14")
    pub date: String,
    pub high_c: f64,
    pub low_c: f64,
    pub conditions: String,
    #[serde(default)]
    pub precipitation_chance_pct: Option<f64>,
}

/// HTTP client for the weather endpoints
pub struct WeatherClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;
        let base_url = base_url(&config)?;
        let http_client = build_http_client(&config)?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Current conditions at a coordinate
    pub async fn current(&self, at: LngLat) -> Result<WeatherReport> {
        let url = format!(
            "{}/weather?lat={}&lng={}",
            self.base_url,
            at.lat(),
            at.lng()
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

    /// Daily forecast at a coordinate, up to `days` days out
    pub async fn forecast(&self, at: LngLat, days: u32) -> Result<Vec<ForecastEntry>> {
        let url = format!(
            "{}/weather/forecast?lat={}&lng={}&days={}",
            self.base_url,
            at.lat(),
            at.lng(),
            days
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
}
