//! Remote service clients
//!
//! One backend serves everything wayfarer talks to over HTTP: the trip
//! collection, the weather and directions proxies, the public map config,
//! and the chat service. Each gets its own small client here, built the
//! same way: bearer-token default headers, a request timeout from config,
//! and responses decoded into the crate error taxonomy.
//!
//! ## Architecture
//!
//! Remote access follows a "local-first" principle:
//! - Trips are always written to the offline store first
//! - Pushing to the server happens afterwards, driven by the sync
//!   coordinator
//! - Network failures never block local operation
//!
//! ## Usage
//!
//! Point wayfarer at a backend in `~/.config/wayfarer/config.toml`:
//!
//! ```toml
//! [api]
//! server_url = "https://trips.example.com"
//! api_key = "wf_live_xxxxxxxxxxxx"
//! ```

mod chat;
mod maps;
mod trips;
mod weather;

pub use chat::{ChatClient, ChatMessage, ChatReply, ChatRole, FileThreadStore, MemoryThreadStore, ThreadStore};
pub use maps::{MapConfig, MapsClient, RouteGeometry};
pub use trips::{ShareLink, TripApiClient};
pub use weather::{ForecastEntry, WeatherClient, WeatherReport};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

/// Resolve and normalize the backend base URL.
pub(crate) fn base_url(config: &ApiConfig) -> Result<String> {
    Ok(config
        .server_url
        .clone()
        .ok_or_else(|| Error::Config("api.server_url is required".to_string()))?
        .trim_end_matches('/')
        .to_string())
}

/// Build the shared HTTP client: JSON content type, bearer auth when an
/// API key is configured, and the configured request timeout.
pub(crate) fn build_http_client(config: &ApiConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(api_key) = &config.api_key {
        let auth_value = format!("Bearer {}", api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
        );
    }

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))
}

/// Body shape the backend uses for errors.
#[derive(Debug, serde::Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
}

/// Map a non-success response onto the error taxonomy: validation errors
/// keep their field list, auth failures stay distinct from not-found, and
/// everything else carries its status code.
pub(crate) async fn error_from_response(response: reqwest::Response) -> Error {
    let status = response.status();
    let text = response.text().await.unwrap_or_else(|_| "unknown".to_string());
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .error
        .or(body.message)
        .unwrap_or_else(|| text.trim().to_string());

    match status.as_u16() {
        400 | 422 => Error::Validation {
            message,
            fields: body.fields,
        },
        401 | 403 => Error::Unauthorized(message),
        404 => Error::NotFound(message),
        code => Error::Api {
            status: code,
            message,
        },
    }
}

/// Check if an error is retryable (transient)
pub(crate) fn is_retryable_error(error: &Error) -> bool {
    match error {
        // Transport failures: timeouts, refused connections, DNS
        Error::Http(_) => true,
        // Server-side failures may clear up; client-side ones will not
        Error::Api { status, .. } => *status >= 500,
        _ => false,
    }
}
