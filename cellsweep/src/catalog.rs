//! Entity metadata lookup.
//!
//! Maps entity type ids to display names, loaded from a JSON file:
//!
//! ```json
//! [{"id": 1, "name": "Bulbasaur"}, {"id": 16, "name": "Pidgey"}]
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors raised while loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        /// Catalog path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The catalog file is not a valid entry list.
    #[error("Invalid catalog {path}: {source}")]
    Parse {
        /// Catalog path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct CatalogEntry {
    id: u32,
    name: String,
}

/// Type id to display name lookup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    names: HashMap<u32, String>,
}

impl Catalog {
    /// Loads a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses a catalog from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Ok(entries.into_iter().map(|e| (e.id, e.name)).collect())
    }

    /// Display name for `type_id`, if known.
    pub fn name(&self, type_id: u32) -> Option<&str> {
        self.names.get(&type_id).map(String::as_str)
    }

    /// Number of known types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(u32, String)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}
