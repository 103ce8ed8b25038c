//! Wire-level types returned by the map API.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status code the service uses for a successful map-objects query.
pub const STATUS_SUCCESS: i32 = 1;

/// Errors raised by the remote API collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Login was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The response decoded but had an unexpected structure.
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
}

/// Login identity for one scan session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Account name, also used to identify the session in logs.
    pub username: String,
    /// Account secret.
    pub password: String,
}

impl Credential {
    /// Creates a new credential.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response of a map-objects query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapObjectsResponse {
    /// Service status code; [`STATUS_SUCCESS`] on success.
    pub status: i32,

    /// Per-cell listings.
    #[serde(default)]
    pub map_cells: Vec<MapCellListing>,
}

impl MapObjectsResponse {
    /// Creates a successful response with the given listings.
    pub fn success(map_cells: Vec<MapCellListing>) -> Self {
        Self {
            status: STATUS_SUCCESS,
            map_cells,
        }
    }

    /// Returns true if the service reported success.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Iterates every raw entity across all listings.
    pub fn entities(&self) -> impl Iterator<Item = &RawEntity> {
        self.map_cells
            .iter()
            .filter_map(|listing| listing.entities.as_ref())
            .flatten()
    }
}

/// Objects of one cell in a map-objects response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapCellListing {
    /// Entities currently visible in the cell, if the service sent any.
    #[serde(default)]
    pub entities: Option<Vec<RawEntity>>,
}

impl MapCellListing {
    /// Creates a listing holding `entities`.
    pub fn with_entities(entities: Vec<RawEntity>) -> Self {
        Self {
            entities: Some(entities),
        }
    }
}

/// An undecoded entity record as sent by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    /// Unique key of this sighting.
    pub encounter_id: u64,
    /// Entity type.
    pub type_id: u32,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Key of the site the entity appeared at.
    pub spawn_point_id: String,
    /// Milliseconds until the entity disappears.
    pub time_till_hidden_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(encounter_id: u64) -> RawEntity {
        RawEntity {
            encounter_id,
            type_id: 16,
            latitude: 47.6,
            longitude: -122.3,
            spawn_point_id: "54906ab4b1b".to_string(),
            time_till_hidden_ms: 600_000,
        }
    }

    #[test]
    fn test_entities_flattens_listings() {
        let response = MapObjectsResponse::success(vec![
            MapCellListing::with_entities(vec![raw(1), raw(2)]),
            MapCellListing::default(),
            MapCellListing::with_entities(vec![raw(3)]),
        ]);

        let ids: Vec<u64> = response.entities().map(|e| e.encounter_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_is_success() {
        assert!(MapObjectsResponse::success(Vec::new()).is_success());
        let failed = MapObjectsResponse {
            status: 3,
            map_cells: Vec::new(),
        };
        assert!(!failed.is_success());
    }

    #[test]
    fn test_response_decodes_without_optional_fields() {
        let response: MapObjectsResponse =
            serde_json::from_str(r#"{"status": 1, "map_cells": [{}]}"#).unwrap();
        assert_eq!(response.map_cells.len(), 1);
        assert_eq!(response.entities().count(), 0);
    }

    #[test]
    fn test_credential_debug_hides_password() {
        let credential = Credential::new("scout1", "hunter2");
        let debug = format!("{:?}", credential);
        assert!(debug.contains("scout1"));
        assert!(!debug.contains("hunter2"));
    }
}
