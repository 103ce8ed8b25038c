//! Geofence coverage: polygon to covering cell set.
//!
//! # Algorithm
//!
//! ```text
//!   centroid ──► seed cell
//!                   │
//!                   ▼
//!   ┌──────────────────────────────┐
//!   │ BFS over edge adjacency      │  center inside polygon?
//!   │  pop ─► test ─► expand       │──── no ──► discard, don't expand
//!   └──────────────┬───────────────┘
//!                  │ frontier exhausted
//!                  ▼
//!   border ring: add every neighbor of every interior cell
//! ```
//!
//! The border ring guarantees cells straddling the boundary are scanned even
//! when their center falls just outside. The seed is always treated as
//! interior, so a polygon smaller than one cell (or a degenerate one) still
//! yields the seed and its ring.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::coord::Cell;
use crate::geometry::{Area, Polygon};

/// Computes the set of cells at `level` covering `area`.
pub fn compute(area: &Area, level: u8) -> BTreeSet<Cell> {
    cover_polygon(&area.polygon, level)
}

/// Computes the set of cells at `level` covering `polygon`.
pub fn cover_polygon(polygon: &Polygon, level: u8) -> BTreeSet<Cell> {
    let seed = Cell::containing(polygon.centroid(), level);

    let mut visited = HashSet::from([seed]);
    let mut frontier = VecDeque::from([seed]);
    let mut cells = BTreeSet::new();

    while let Some(cell) = frontier.pop_front() {
        if cell != seed && !polygon.contains(cell.center()) {
            continue;
        }

        cells.insert(cell);

        for neighbor in cell.edge_neighbors() {
            if visited.insert(neighbor) {
                frontier.push_back(neighbor);
            }
        }
    }

    let interior: Vec<Cell> = cells.iter().copied().collect();
    for cell in interior {
        cells.extend(cell.edge_neighbors());
    }

    cells
}

/// Builds a Static Maps URL with one marker per cell center.
///
/// Handy for eyeballing an area's coverage in a browser.
pub fn static_map_url<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> String {
    let markers: Vec<String> = cells
        .into_iter()
        .map(|cell| {
            let center = cell.center();
            format!("{:.6},{:.6}", center.lat, center.lng)
        })
        .collect();

    format!(
        "https://maps.googleapis.com/maps/api/staticmap?size=800x800&markers=color:blue|{}",
        markers.join("|")
    )
}
