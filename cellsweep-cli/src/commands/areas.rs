//! Areas command - list configured areas.

use cellsweep::config::ConfigFile;
use cellsweep::coverage;

use crate::error::CliError;

/// Run the areas command.
pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    if config.areas.is_empty() {
        println!("No areas configured. Add an [area:NAME] section to config.ini.");
        return Ok(());
    }

    let level = config.scan.subdivision_level;

    println!("Configured Areas (level {})", level);
    println!("===========================");
    println!();

    let mut total = 0;
    for area in &config.areas {
        let cells = coverage::compute(area, level).len();
        total += cells;
        println!(
            "  {:<20} {:>3} vertices  {:>6} cells  center {}",
            area.name,
            area.polygon.vertices().len(),
            cells,
            area.polygon.centroid()
        );
    }

    println!();
    println!("{} areas, {} cells per pass (before overlap)", config.areas.len(), total);
    println!("{} accounts", config.accounts.len());

    Ok(())
}
