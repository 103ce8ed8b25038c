//! INI configuration file.
//!
//! ```ini
//! [scan]
//! pacing_interval_s = 5
//! subdivision_level = 16
//!
//! [area:downtown]
//! polygon = 47.61,-122.35; 47.62,-122.33; 47.60,-122.32
//!
//! [account:scout1]
//! username = scout1
//! password = hunter2
//! ```
//!
//! Every section is optional. Areas and accounts keep their file order.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use super::scan::ScanConfig;
use crate::api::{Credential, GatewayConfig};
use crate::coord::{self, LatLng, MAX_LEVEL};
use crate::geometry::{Area, Polygon};
use crate::logging::LoggingConfig;

/// Section prefix of area definitions.
pub const AREA_PREFIX: &str = "area:";

/// Section prefix of account definitions.
pub const ACCOUNT_PREFIX: &str = "account:";

/// Default sighting store, relative to the working directory.
pub const DEFAULT_STORAGE_PATH: &str = "sightings.jsonl";

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },

    /// A required key is absent.
    #[error("[{section}] missing required key '{key}'")]
    Missing { section: String, key: String },

    /// A key holds an unusable value.
    #[error("[{section}] {key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(section: &str, key: &str, value: &str, reason: impl Display) -> Self {
        ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Sighting storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// JSON-lines file receiving new sightings.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORAGE_PATH),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub scan: ScanConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    /// Entity catalog, if configured.
    pub catalog: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub areas: Vec<Area>,
    pub accounts: Vec<Credential>,
}

/// Default location of the configuration file.
///
/// `<config dir>/cellsweep/config.ini`, falling back to the working
/// directory when the platform has no config directory.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("cellsweep"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.ini")
}

impl ConfigFile {
    /// Loads the file at the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ini = Ini::load_from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Parses configuration text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Looks up an area by name.
    pub fn area(&self, name: &str) -> Option<&Area> {
        self.areas.iter().find(|area| area.name == name)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = ConfigFile::default();

        if let Some(props) = ini.section(Some("scan")) {
            config.scan = parse_scan(props)?;
        }
        validate_scan(&config.scan)?;

        if let Some(props) = ini.section(Some("gateway")) {
            if let Some(url) = props.get("base_url") {
                config.gateway.base_url = url.trim_end_matches('/').to_string();
            }
            if let Some(timeout) = seconds(props, "gateway", "timeout_s")? {
                config.gateway.timeout = timeout;
            }
        }

        if let Some(path) = ini.section(Some("storage")).and_then(|p| p.get("path")) {
            config.storage.path = PathBuf::from(path);
        }

        config.catalog = ini
            .section(Some("catalog"))
            .and_then(|p| p.get("path"))
            .map(PathBuf::from);

        if let Some(props) = ini.section(Some("logging")) {
            if let Some(dir) = props.get("directory") {
                config.logging.directory = PathBuf::from(dir);
            }
            if let Some(level) = props.get("level") {
                config.logging.level = level.to_string();
            }
        }

        for (name, props) in ini.iter() {
            let Some(name) = name else { continue };

            if let Some(area) = name.strip_prefix(AREA_PREFIX) {
                config.areas.push(parse_area(name, area.trim(), props)?);
            } else if let Some(account) = name.strip_prefix(ACCOUNT_PREFIX) {
                config.accounts.push(parse_account(name, account.trim(), props)?);
            }
        }

        Ok(config)
    }
}

// =============================================================================
// Section parsers
// =============================================================================

fn parse_scan(props: &Properties) -> Result<ScanConfig, ConfigError> {
    const SECTION: &str = "scan";
    let mut scan = ScanConfig::default();

    if let Some(pacing) = seconds(props, SECTION, "pacing_interval_s")? {
        scan.pacing_interval = pacing;
    }
    if let Some(level) = value::<u8>(props, SECTION, "subdivision_level")? {
        scan.subdivision_level = level;
    }
    if let Some(capacity) = value::<usize>(props, SECTION, "queue_capacity")? {
        scan.queue_capacity = capacity;
    }
    if let Some(ceiling) = seconds(props, SECTION, "backoff_ceiling_s")? {
        scan.backoff_ceiling = ceiling;
    }
    if let Some(batch) = value::<u32>(props, SECTION, "batch_size")? {
        scan.batch_size = batch;
    }
    if let Some(delay) = seconds(props, SECTION, "login_retry_delay_s")? {
        scan.login_retry_delay = delay;
    }
    if let Some(attempts) = value::<u32>(props, SECTION, "max_login_attempts")? {
        scan.max_login_attempts = Some(attempts);
    }
    if let Some(jitter) = value::<bool>(props, SECTION, "start_jitter")? {
        scan.start_jitter = jitter;
    }

    Ok(scan)
}

fn validate_scan(scan: &ScanConfig) -> Result<(), ConfigError> {
    const SECTION: &str = "scan";

    if scan.subdivision_level > MAX_LEVEL {
        return Err(ConfigError::invalid(
            SECTION,
            "subdivision_level",
            &scan.subdivision_level.to_string(),
            format!("must be at most {}", MAX_LEVEL),
        ));
    }
    if scan.queue_capacity == 0 {
        return Err(ConfigError::invalid(
            SECTION,
            "queue_capacity",
            "0",
            "must be at least 1",
        ));
    }
    if scan.pacing_interval.is_zero() {
        return Err(ConfigError::invalid(
            SECTION,
            "pacing_interval_s",
            "0",
            "must be positive",
        ));
    }
    if scan.backoff_ceiling < scan.pacing_interval {
        return Err(ConfigError::invalid(
            SECTION,
            "backoff_ceiling_s",
            &scan.backoff_ceiling.as_secs_f64().to_string(),
            "must not be below pacing_interval_s",
        ));
    }
    Ok(())
}

fn parse_area(section: &str, name: &str, props: &Properties) -> Result<Area, ConfigError> {
    let raw = props.get("polygon").ok_or_else(|| ConfigError::Missing {
        section: section.to_string(),
        key: "polygon".to_string(),
    })?;
    let polygon = parse_polygon(raw)
        .map_err(|reason| ConfigError::invalid(section, "polygon", raw, reason))?;
    if polygon.is_empty() {
        return Err(ConfigError::invalid(section, "polygon", raw, "no vertices"));
    }
    Ok(Area::new(name, polygon))
}

fn parse_account(
    section: &str,
    name: &str,
    props: &Properties,
) -> Result<Credential, ConfigError> {
    let username = props.get("username").unwrap_or(name);
    let password = props.get("password").ok_or_else(|| ConfigError::Missing {
        section: section.to_string(),
        key: "password".to_string(),
    })?;
    Ok(Credential::new(username, password))
}

/// Parses `lat,lng; lat,lng; ...`.
///
/// Every vertex must lie inside the Web Mercator bounds that cells cover.
pub fn parse_polygon(raw: &str) -> Result<Polygon, String> {
    let mut vertices = Vec::new();

    for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (lat, lng) = pair
            .split_once(',')
            .ok_or_else(|| format!("vertex '{}' is not 'lat,lng'", pair))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
        let lng: f64 = lng
            .trim()
            .parse()
            .map_err(|_| format!("invalid longitude '{}'", lng.trim()))?;

        coord::to_cell(lat, lng, 0)
            .map_err(|e| format!("vertex {},{} is out of range: {}", lat, lng, e))?;
        vertices.push(LatLng::new(lat, lng));
    }

    Ok(Polygon::new(vertices))
}

// =============================================================================
// Value helpers
// =============================================================================

fn value<T>(props: &Properties, section: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match props.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::invalid(section, key, raw, e)),
    }
}

fn seconds(props: &Properties, section: &str, key: &str) -> Result<Option<Duration>, ConfigError> {
    let Some(secs) = value::<f64>(props, section, key)? else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(secs).map(Some).map_err(|e| {
        let raw = props.get(key).unwrap_or_default();
        ConfigError::invalid(section, key, raw, e)
    })
}
