//! Configuration
//!
//! Two layers:
//!
//! - [`ScanConfig`]: typed engine tunables, usable without any file
//! - [`ConfigFile`]: the INI file (`config.ini`) holding scan tunables,
//!   gateway, storage, catalog and logging settings plus the area and
//!   account lists
//!
//! # Example
//!
//! ```ignore
//! use cellsweep::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! for area in &config.areas {
//!     println!("{}: {} vertices", area.name, area.polygon.vertices().len());
//! }
//! ```

mod file;
mod scan;

pub use file::{
    config_file_path, parse_polygon, ConfigError, ConfigFile, StorageConfig, ACCOUNT_PREFIX,
    AREA_PREFIX, DEFAULT_STORAGE_PATH,
};
pub use scan::{
    ScanConfig, DEFAULT_BATCH_SIZE, DEFAULT_PACING_INTERVAL_SECS, DEFAULT_SUBDIVISION_LEVEL,
};
