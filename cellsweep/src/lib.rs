//! cellsweep - Geofenced scanning of a rate-limited map API
//!
//! This library continuously surveys configured geographic areas for
//! short-lived, location-tagged entities and records each one exactly once.
//!
//! # Architecture
//!
//! ```text
//! Area polygons ──► coverage (flood fill) ──► AreaSweepController
//!                                                  │ push (blocks)
//!                                                  ▼
//!                                            TaskQueue (cap 1)
//!                                                  │ pop
//!                         ┌────────────────────────┼────────────────────────┐
//!                         ▼                        ▼                        ▼
//!                   ScanSession A            ScanSession B            ScanSession C
//!                   (own login)              (own login)              (own login)
//!                         └────────────────────────┼────────────────────────┘
//!                                                  ▼
//!                                        Sink (dedup by encounter id)
//! ```
//!
//! [`survey::Surveyor`] wires the pieces together; the modules are usable
//! on their own.

pub mod api;
pub mod catalog;
pub mod config;
pub mod coord;
pub mod coverage;
pub mod entity;
pub mod geometry;
pub mod logging;
pub mod queue;
pub mod session;
pub mod shutdown;
pub mod sink;
pub mod survey;
pub mod sweep;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
