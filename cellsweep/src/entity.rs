//! Decoded entity observations.

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, RawEntity};
use crate::coord::LatLng;

/// Unique key of one sighting; the sink deduplicates on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncounterId(pub u64);

impl fmt::Display for EncounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded, timestamped observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique key of the sighting.
    pub encounter_id: EncounterId,
    /// Entity type, resolvable through the catalog.
    pub type_id: u32,
    /// Where the entity was seen.
    pub position: LatLng,
    /// Key of the site the entity appeared at.
    pub spawn_point_id: String,
    /// When the scanner received the observation.
    pub observed_at: DateTime<Utc>,
    /// When the entity stops being visible.
    pub visible_until: DateTime<Utc>,
}

impl Entity {
    /// Decodes a raw record observed at `observed_at`.
    ///
    /// `visible_until` is derived from the record's time-until-hidden.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] for out-of-range coordinates or a
    /// time-until-hidden that is negative or beyond the representable range.
    pub fn from_raw(raw: &RawEntity, observed_at: DateTime<Utc>) -> Result<Self, ApiError> {
        let position = LatLng::new(raw.latitude, raw.longitude);
        if !position.is_valid() {
            return Err(ApiError::Decode(format!(
                "encounter {} has invalid position {}",
                raw.encounter_id, position
            )));
        }
        if raw.time_till_hidden_ms < 0 {
            return Err(ApiError::Decode(format!(
                "encounter {} has negative time until hidden ({} ms)",
                raw.encounter_id, raw.time_till_hidden_ms
            )));
        }

        let visible_until = ChronoDuration::try_milliseconds(raw.time_till_hidden_ms)
            .and_then(|ttl| observed_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                ApiError::Decode(format!(
                    "encounter {} has out-of-range time until hidden ({} ms)",
                    raw.encounter_id, raw.time_till_hidden_ms
                ))
            })?;

        Ok(Self {
            encounter_id: EncounterId(raw.encounter_id),
            type_id: raw.type_id,
            position,
            spawn_point_id: raw.spawn_point_id.clone(),
            observed_at,
            visible_until,
        })
    }
}
