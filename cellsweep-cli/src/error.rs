//! CLI error type.

use std::fmt;

use cellsweep::api::ApiError;
use cellsweep::catalog::CatalogError;
use cellsweep::config::ConfigError;
use cellsweep::logging::LoggingError;
use cellsweep::sink::SinkError;
use cellsweep::survey::SurveyError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration missing or invalid.
    Config(String),

    /// Logging could not be set up.
    Logging(LoggingError),

    /// The sighting store could not be opened.
    Storage(SinkError),

    /// The entity catalog could not be loaded.
    Catalog(CatalogError),

    /// The gateway client could not be created.
    Gateway(ApiError),

    /// The survey failed to start.
    Survey(SurveyError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Storage(e) => write!(f, "Storage error: {}", e),
            CliError::Catalog(e) => write!(f, "Catalog error: {}", e),
            CliError::Gateway(e) => write!(f, "Gateway error: {}", e),
            CliError::Survey(e) => write!(f, "Survey failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::Logging(e) => Some(e),
            CliError::Storage(e) => Some(e),
            CliError::Catalog(e) => Some(e),
            CliError::Gateway(e) => Some(e),
            CliError::Survey(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<SinkError> for CliError {
    fn from(e: SinkError) -> Self {
        CliError::Storage(e)
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<ApiError> for CliError {
    fn from(e: ApiError) -> Self {
        CliError::Gateway(e)
    }
}

impl From<SurveyError> for CliError {
    fn from(e: SurveyError) -> Self {
        CliError::Survey(e)
    }
}
