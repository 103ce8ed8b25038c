//! Remote map API abstraction
//!
//! The scanner talks to a rate-limited, session-authenticated map service.
//! The protocol itself is owned by the service; this module only defines
//! the operations the engine needs:
//!
//! - [`MapConnector`]: position + login, producing a [`MapSession`]
//! - [`MapSession`]: ticket expiry, position updates and map-object queries
//!
//! A re-login never mutates an existing session: the connector hands out a
//! fresh [`MapSession`] that replaces the old one.
//!
//! For a concrete client, use the [`JsonGatewayConnector`]:
//!
//! ```ignore
//! use cellsweep::api::{JsonGatewayConnector, GatewayConfig};
//!
//! let connector = JsonGatewayConnector::new(GatewayConfig::default())?;
//! let session = connector.connect(&credential, cell.center())?;
//! ```

mod json;
mod types;

pub use json::{GatewayConfig, JsonGatewayConnector, DEFAULT_GATEWAY_TIMEOUT_SECS};
pub use types::{
    ApiError, Credential, MapCellListing, MapObjectsResponse, RawEntity, STATUS_SUCCESS,
};

use chrono::{DateTime, Utc};

use crate::coord::{CellId, LatLng};

/// Establishes authenticated sessions with the remote API.
///
/// Shared by every scan session, so implementations must be thread-safe.
pub trait MapConnector: Send + Sync {
    /// Sets the reported position to `position` and logs in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] if the credential was rejected, or a
    /// transport error if the service could not be reached.
    fn connect(
        &self,
        credential: &Credential,
        position: LatLng,
    ) -> Result<Box<dyn MapSession>, ApiError>;
}

/// One authenticated connection, owned by exactly one scan session.
pub trait MapSession: Send {
    /// When the login ticket stops being accepted, if known.
    fn ticket_expires_at(&self) -> Option<DateTime<Utc>>;

    /// Updates the position reported with subsequent queries.
    fn set_position(&mut self, position: LatLng);

    /// Queries the objects visible in `cell` from `position`.
    ///
    /// `Ok(None)` means the service answered without a map-objects payload.
    fn query_map_objects(
        &mut self,
        cell: CellId,
        position: LatLng,
    ) -> Result<Option<MapObjectsResponse>, ApiError>;
}
