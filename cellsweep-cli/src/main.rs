//! cellsweep CLI - Command-line interface
//!
//! Runs surveys and inspects area coverage using the settings in
//! `config.ini`.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "cellsweep", version, about = "Continuous geofenced survey of a map API")]
struct Cli {
    /// Configuration file (defaults to <config dir>/cellsweep/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Survey all configured areas until interrupted with Ctrl+C
    Run {
        /// Sighting store, overriding [storage] path
        #[arg(long, value_name = "PATH")]
        storage: Option<PathBuf>,
    },

    /// Show the cells covering an area
    Coverage {
        /// Area name as configured in an [area:NAME] section
        area: String,

        /// Subdivision level, overriding [scan] subdivision_level
        #[arg(long)]
        level: Option<u8>,

        /// Also print a static map URL with one marker per cell
        #[arg(long)]
        map_url: bool,
    },

    /// List configured areas with their cell counts
    Areas,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { storage } => commands::run::run(config, storage),
        Commands::Coverage {
            area,
            level,
            map_url,
        } => commands::coverage::run(&config, &area, level, map_url),
        Commands::Areas => commands::areas::run(&config),
    }
}
