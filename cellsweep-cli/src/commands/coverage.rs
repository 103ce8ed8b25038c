//! Coverage command - show the cells covering one area.

use cellsweep::config::ConfigFile;
use cellsweep::coord::MAX_LEVEL;
use cellsweep::coverage;

use crate::error::CliError;

/// Run the coverage command.
pub fn run(
    config: &ConfigFile,
    area_name: &str,
    level: Option<u8>,
    map_url: bool,
) -> Result<(), CliError> {
    let area = config.area(area_name).ok_or_else(|| {
        CliError::Config(format!(
            "Unknown area '{}'. Use 'cellsweep areas' to list configured areas.",
            area_name
        ))
    })?;

    let level = level.unwrap_or(config.scan.subdivision_level);
    if level > MAX_LEVEL {
        return Err(CliError::Config(format!(
            "Level {} is above the maximum of {}",
            level, MAX_LEVEL
        )));
    }

    let cells = coverage::compute(area, level);

    println!("Area:   {}", area.name);
    println!("Level:  {}", level);
    println!("Cells:  {}", cells.len());
    println!();
    for cell in &cells {
        println!("  {}  {:<20}  {}", cell.id(), cell.to_string(), cell.center());
    }

    if map_url {
        println!();
        println!("{}", coverage::static_map_url(&cells));
    }

    Ok(())
}
