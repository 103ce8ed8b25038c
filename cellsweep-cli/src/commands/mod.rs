//! CLI command handlers.

pub mod areas;
pub mod coverage;
pub mod run;

use std::path::Path;

use cellsweep::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Loads the configuration file, from `path` or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let default_path;
    let path = match path {
        Some(path) => path,
        None => {
            default_path = config_file_path();
            if !default_path.exists() {
                return Err(CliError::Config(format!(
                    "No config file at {}. Create one or pass --config.",
                    default_path.display()
                )));
            }
            &default_path
        }
    };

    Ok(ConfigFile::load_from(path)?)
}
