//! Sink decorator announcing new sightings.

use std::sync::Arc;

use tracing::info;

use super::{Sink, SinkError, SinkStats};
use crate::catalog::Catalog;
use crate::entity::Entity;

/// Wraps a sink and logs every newly inserted entity by display name.
#[derive(Debug)]
pub struct AnnouncingSink<S> {
    inner: S,
    catalog: Arc<Catalog>,
}

impl<S: Sink> AnnouncingSink<S> {
    /// Wraps `inner`, resolving names through `catalog`.
    pub fn new(inner: S, catalog: Arc<Catalog>) -> Self {
        Self { inner, catalog }
    }

    /// Returns the wrapped sink.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Sink> Sink for AnnouncingSink<S> {
    fn report(&self, entity: &Entity) -> Result<bool, SinkError> {
        let inserted = self.inner.report(entity)?;
        if inserted {
            info!(
                encounter = %entity.encounter_id,
                name = self.catalog.name(entity.type_id).unwrap_or("unknown"),
                type_id = entity.type_id,
                position = %entity.position,
                visible_until = %entity.visible_until.format("%H:%M:%S"),
                "New sighting"
            );
        }
        Ok(inserted)
    }

    fn stats(&self) -> SinkStats {
        self.inner.stats()
    }
}
