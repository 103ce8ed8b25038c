//! JSON gateway client.
//!
//! Talks to an HTTP gateway that fronts the map service and exposes its
//! login and map-objects calls as JSON:
//!
//! ```text
//! POST {base}/login        {username, password, latitude, longitude}
//!                       ◄─ {token, ticket_expires_ms}
//! POST {base}/map-objects  {cell_id, latitude, longitude}   (Bearer token)
//!                       ◄─ {status, map_cells: [{entities: [...]}]} | 204
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ApiError, Credential, MapObjectsResponse};
use super::{MapConnector, MapSession};
use crate::coord::{CellId, LatLng};

/// Default request timeout for gateway calls.
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the JSON gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    ticket_expires_ms: Option<i64>,
}

#[derive(Serialize)]
struct MapObjectsRequest {
    cell_id: u64,
    latitude: f64,
    longitude: f64,
}

/// [`MapConnector`] backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct JsonGatewayConnector {
    client: Client,
    config: GatewayConfig,
}

impl JsonGatewayConnector {
    /// Creates a connector with the given settings.
    pub fn new(config: GatewayConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

impl MapConnector for JsonGatewayConnector {
    fn connect(
        &self,
        credential: &Credential,
        position: LatLng,
    ) -> Result<Box<dyn MapSession>, ApiError> {
        let url = self.config.endpoint("login");
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                username: &credential.username,
                password: &credential.password,
                latitude: position.lat,
                longitude: position.lng,
            })
            .send()
            .map_err(|e| ApiError::Transport(format!("Login request failed: {}", e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ApiError::Auth(format!(
                    "Login rejected for {} (HTTP {})",
                    credential.username,
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(ApiError::Transport(format!(
                    "HTTP {} from {}",
                    status, url
                )));
            }
            _ => {}
        }

        let login: LoginResponse = response
            .json()
            .map_err(|e| ApiError::Decode(format!("Invalid login response: {}", e)))?;

        let expires_at = login
            .ticket_expires_ms
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        debug!(
            account = %credential.username,
            expires_at = ?expires_at,
            "Gateway login succeeded"
        );

        Ok(Box::new(JsonGatewaySession {
            client: self.client.clone(),
            config: self.config.clone(),
            token: login.token,
            expires_at,
        }))
    }
}

/// An authenticated gateway session.
struct JsonGatewaySession {
    client: Client,
    config: GatewayConfig,
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl MapSession for JsonGatewaySession {
    fn ticket_expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    // The gateway receives the position with every query
    fn set_position(&mut self, _position: LatLng) {}

    fn query_map_objects(
        &mut self,
        cell: CellId,
        position: LatLng,
    ) -> Result<Option<MapObjectsResponse>, ApiError> {
        let url = self.config.endpoint("map-objects");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&MapObjectsRequest {
                cell_id: cell.0,
                latitude: position.lat,
                longitude: position.lng,
            })
            .send()
            .map_err(|e| ApiError::Transport(format!("Map query failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::Transport(format!("HTTP {} from {}", status, url)));
        }

        response
            .json()
            .map(Some)
            .map_err(|e| ApiError::Decode(format!("Invalid map-objects response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let config = GatewayConfig {
            base_url: "http://gateway.local/api/".to_string(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.endpoint("login"), "http://gateway.local/api/login");
    }

    #[test]
    fn test_connector_creation() {
        assert!(JsonGatewayConnector::new(GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_connect_to_unreachable_gateway_is_transport_error() {
        let connector = JsonGatewayConnector::new(GatewayConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let result = connector.connect(&Credential::new("a", "b"), LatLng::new(0.0, 0.0));
        assert!(matches!(result, Err(ApiError::Transport(_))));
    }
}
