//! Run command - survey all configured areas until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use cellsweep::api::JsonGatewayConnector;
use cellsweep::catalog::Catalog;
use cellsweep::config::ConfigFile;
use cellsweep::coord::Cell;
use cellsweep::geometry::Area;
use cellsweep::logging;
use cellsweep::sink::{AnnouncingSink, JsonLinesSink, Sink};
use cellsweep::survey::{SurveyReport, Surveyor};
use cellsweep::sweep::SweepObserver;

use crate::error::CliError;

/// Run the survey.
pub fn run(config: ConfigFile, storage: Option<PathBuf>) -> Result<(), CliError> {
    let _log_guard = logging::init(&config.logging)?;
    info!(version = cellsweep::VERSION, "cellsweep starting");

    let storage = storage.unwrap_or_else(|| config.storage.path.clone());
    let store = JsonLinesSink::open(&storage)?;
    let stored = store.len();

    let sink: Arc<dyn Sink> = match &config.catalog {
        Some(path) => {
            let catalog = Catalog::load(path)?;
            info!(path = %path.display(), entries = catalog.len(), "Catalog loaded");
            Arc::new(AnnouncingSink::new(store, Arc::new(catalog)))
        }
        None => Arc::new(store),
    };

    let connector = JsonGatewayConnector::new(config.gateway.clone())?;

    println!("cellsweep v{}", cellsweep::VERSION);
    println!("================");
    println!();
    println!("Gateway:  {}", config.gateway.base_url);
    println!("Storage:  {} ({} sightings)", storage.display(), stored);
    println!("Areas:    {}", config.areas.len());
    println!("Accounts: {}", config.accounts.len());
    println!("Level:    {}", config.scan.subdivision_level);
    println!("Pacing:   {:?}", config.scan.pacing_interval);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let surveyor = Surveyor::new(
        config.areas,
        config.accounts,
        config.scan,
        Arc::new(connector),
        sink,
    );

    // Set up signal handler for graceful shutdown
    let stop = surveyor.stop_handle();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received shutdown signal, finishing current cells...");
        stop.trigger();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let progress = AreaProgress::new();
    let report = surveyor.run(&progress)?;
    progress.finish();

    print_report(&report);
    Ok(())
}

fn print_report(report: &SurveyReport) {
    println!();
    println!("Survey stopped");
    println!("  Passes completed: {}", report.passes_completed);
    println!("  Cells enqueued:   {}", report.cells_enqueued);
    println!("  New sightings:    {}", report.sink.inserted);
    println!("  Duplicates:       {}", report.sink.duplicates);
    for (account, stats) in &report.sessions {
        println!(
            "  {}: {} scanned, {} failed, {} logins",
            account, stats.cells_scanned, stats.cells_failed, stats.logins
        );
    }
}

/// Progress bar tracking the area currently being enqueued.
struct AreaProgress {
    bar: ProgressBar,
}

impl AreaProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg:<16} [{bar:40.cyan/blue}] {pos}/{len} cells",
        )
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SweepObserver for AreaProgress {
    fn area_started(&self, area: &Area, cells: usize) {
        self.bar.reset();
        self.bar.set_length(cells as u64);
        self.bar.set_message(area.name.clone());
    }

    fn cell_enqueued(&self, _area: &Area, _cell: &Cell) {
        self.bar.inc(1);
    }

    fn area_finished(&self, area: &Area, new_entities: u64) {
        self.bar.println(format!("{}: done, found {}", area.name, new_entities));
    }

    fn pass_finished(&self, pass: u64, cells: usize) {
        self.bar.println(format!("Pass {} complete ({} cells)", pass, cells));
    }
}
