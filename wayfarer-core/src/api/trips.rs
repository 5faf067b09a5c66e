//! HTTP client for the trip collection service
//!
//! Covers the CRUD surface plus the share endpoints. Created trips come
//! back with the server-assigned id; the sync coordinator records that id
//! against the offline entry.

use std::time::Duration;

use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::Trip;

use super::{base_url, build_http_client, error_from_response, is_retryable_error};

/// Response from POST /trips/{id}/share
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    /// Opaque token for the public share URL
    pub shareable_id: String,
    /// Full URL to hand out
    pub url: String,
}

/// HTTP client for the trip collection API
pub struct TripApiClient {
    config: ApiConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl TripApiClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing the
    /// server URL.
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;
        let base_url = base_url(&config)?;
        let http_client = build_http_client(&config)?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    /// Fetch the full remote trip collection
    pub async fn list_trips(&self) -> Result<Vec<Trip>> {
        let url = format!("{}/trips", self.base_url);

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

    /// Fetch one trip by server id
    ///
    /// A trip that does not exist on the server surfaces as
    /// [`Error::NotFound`].
    pub async fn get_trip(&self, id: i64) -> Result<Trip> {
        let url = format!("{}/trips/{}", self.base_url, id);

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

    /// Create a trip on the server
    ///
    /// The response echoes the trip with its server-assigned id.
    pub async fn create_trip(&self, trip: &Trip) -> Result<Trip> {
        let url = format!("{}/trips", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(trip)
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

    /// Create a trip with retry logic
    ///
    /// Retries transient failures (5xx, timeouts) with exponential backoff.
    pub async fn create_trip_with_retry(&self, trip: &Trip) -> Result<Trip> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying create_trip (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.config.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.create_trip(trip).await {
                Ok(created) => return Ok(created),
                Err(e) => {
                    if is_retryable_error(&e) {
                        tracing::warn!("Transient error creating trip: {}", e);
                        last_error = Some(e);
                        continue;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Http("max retries exceeded".to_string())))
    }

    /// Update a trip on the server
    pub async fn update_trip(&self, id: i64, trip: &Trip) -> Result<Trip> {
        let url = format!("{}/trips/{}", self.base_url, id);

        let response = self
            .http_client
            .patch(&url)
            .json(trip)
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

    /// Delete a trip on the server
    ///
    /// Returns false if the trip did not exist. Callers must only reach
    /// for this when the trip actually has a server id; offline-only trips
    /// are deleted from the store alone.
    pub async fn delete_trip(&self, id: i64) -> Result<bool> {
        let url = format!("{}/trips/{}", self.base_url, id);

        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Create a public share link for a trip
    pub async fn share_trip(&self, id: i64) -> Result<ShareLink> {
        let url = format!("{}/trips/{}/share", self.base_url, id);

        let response = self
            .http_client
            .post(&url)
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

    /// Fetch a shared trip by its shareable token (no auth required)
    ///
    /// An unknown or revoked token surfaces as [`Error::NotFound`].
    pub async fn shared_trip(&self, shareable_id: &str) -> Result<Trip> {
        let url = format!(
            "{}/trips/shared/{}",
            self.base_url,
            urlencoding::encode(shareable_id)
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

    /// Check if the server is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    #[test]
    fn test_client_requires_server_url() {
        let config = ApiConfig::default();
        assert!(TripApiClient::new(config).is_err());
    }

    #[test]
    fn test_client_with_valid_config() {
        let config = ApiConfig {
            server_url: Some("https://trips.example.com".to_string()),
            api_key: Some("wf_live_test".to_string()),
            ..Default::default()
        };
        assert!(TripApiClient::new(config).is_ok());
    }

    /// Serve exactly one request with a canned response, handing the
    /// request head (request line + headers) back to the test.
    fn one_shot_server(response: String) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            let head_end = loop {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break None,
                    Ok(n) => {
                        raw.extend_from_slice(&buf[..n]);
                        if let Some(i) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                            break Some(i + 4);
                        }
                    }
                }
            };
            if let Some(head_end) = head_end {
                let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
                // Drain the body so the client never sees a reset mid-write
                let body_len = head
                    .lines()
                    .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
                    .and_then(|l| l.split(':').nth(1))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while raw.len() < head_end + body_len {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => raw.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tx.send(head);
            }
            let _ = stream.write_all(response.as_bytes());
        });

        (format!("http://{}", addr), rx)
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    fn client_for(url: &str) -> TripApiClient {
        TripApiClient::new(ApiConfig {
            server_url: Some(url.to_string()),
            max_retries: 0,
            ..Default::default()
        })
        .expect("client should build")
    }

    #[tokio::test]
    async fn test_get_trip_maps_404_to_not_found() {
        let (url, _request) =
            one_shot_server(http_response("404 Not Found", r#"{"error":"no trip 7"}"#));

        let err = client_for(&url).get_trip(7).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_shared_trip_maps_404_to_not_found() {
        let (url, _request) =
            one_shot_server(http_response("404 Not Found", r#"{"error":"unknown share"}"#));

        let err = client_for(&url).shared_trip("gone").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_get_trip_decodes_the_server_copy() {
        let (url, _request) =
            one_shot_server(http_response("200 OK", r#"{"id":7,"title":"Fjords"}"#));

        let trip = client_for(&url).get_trip(7).await.expect("trip");
        assert_eq!(trip.id.server_id(), Some(7));
        assert_eq!(trip.title, "Fjords");
    }

    #[tokio::test]
    async fn test_update_trip_sends_patch() {
        let (url, request) =
            one_shot_server(http_response("200 OK", r#"{"id":7,"title":"Fjords"}"#));

        let trip: Trip =
            serde_json::from_str(r#"{"id":"x1","title":"Fjords"}"#).expect("test trip");
        let updated = client_for(&url).update_trip(7, &trip).await.expect("update");
        assert_eq!(updated.id.server_id(), Some(7));

        let head = request.recv().expect("request head");
        assert!(
            head.starts_with("PATCH /trips/7 "),
            "unexpected request line: {head}"
        );
    }
}
