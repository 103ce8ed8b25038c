//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and the fixed-level cells of the Web Mercator quadtree used to partition
//! survey areas.
//!
//! At level `L` the projected world is split into `2^L × 2^L` cells. Rows grow
//! southwards from the northern projection limit and columns grow eastwards
//! from the antimeridian, so a cell's edge neighbors are simply the adjacent
//! rows and columns (with columns wrapping around the globe).

mod types;

pub use types::{Cell, CellId, CoordError, LatLng, MAX_LAT, MAX_LEVEL, MAX_LON, MIN_LAT, MIN_LON};

use std::f64::consts::PI;

/// Converts a geographic position to the cell containing it.
///
/// Unlike [`Cell::containing`] this rejects out-of-range input instead of
/// clamping it. Configured polygon vertices are checked through it.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lng` - Longitude in degrees (-180.0 to 180.0)
/// * `level` - Subdivision level (0 to 24)
#[inline]
pub fn to_cell(lat: f64, lng: f64, level: u8) -> Result<Cell, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lng) {
        return Err(CoordError::InvalidLongitude(lng));
    }
    if level > MAX_LEVEL {
        return Err(CoordError::InvalidLevel(level));
    }

    Ok(Cell::containing(LatLng::new(lat, lng), level))
}

impl Cell {
    /// Returns the cell at `level` containing `position`.
    ///
    /// Latitudes beyond the Mercator limit are clamped to the polar rows,
    /// longitudes are wrapped into `[-180, 180)` and levels deeper than
    /// [`MAX_LEVEL`] are clamped. Non-finite input lands in cell `(0, 0)`.
    pub fn containing(position: LatLng, level: u8) -> Cell {
        let level = level.min(MAX_LEVEL);
        let n = 2.0_f64.powi(level as i32);
        let max_index = (1u32 << level) - 1;

        let lat = if position.lat.is_finite() {
            position.lat.clamp(MIN_LAT, MAX_LAT)
        } else {
            0.0
        };
        let lng = if position.lng.is_finite() {
            (position.lng + 180.0).rem_euclid(360.0) - 180.0
        } else {
            0.0
        };

        let col = ((lng + 180.0) / 360.0 * n).floor().max(0.0) as u32;

        let lat_rad = lat * PI / 180.0;
        let row = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
            .floor()
            .max(0.0) as u32;

        Cell {
            row: row.min(max_index),
            col: col.min(max_index),
            level,
        }
    }

    /// Returns the geographic centroid of this cell.
    #[inline]
    pub fn center(&self) -> LatLng {
        let n = 2.0_f64.powi(self.level as i32);

        let lng = (self.col as f64 + 0.5) / n * 360.0 - 180.0;

        // Inverse Web Mercator for the row midpoint
        let y = (self.row as f64 + 0.5) / n;
        let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();

        LatLng::new(lat_rad * 180.0 / PI, lng)
    }

    /// Returns the cells sharing an edge with this one at the same level.
    ///
    /// North and south neighbors stop at the polar rows. East and west
    /// neighbors wrap around the antimeridian. The result never contains
    /// `self` and never repeats a cell.
    pub fn edge_neighbors(&self) -> Vec<Cell> {
        let span = self.span();
        let mut neighbors = Vec::with_capacity(4);

        if self.row > 0 {
            neighbors.push(Cell {
                row: self.row - 1,
                ..*self
            });
        }
        if self.row + 1 < span {
            neighbors.push(Cell {
                row: self.row + 1,
                ..*self
            });
        }

        let east = Cell {
            col: (self.col + 1) % span,
            ..*self
        };
        let west = Cell {
            col: (self.col + span - 1) % span,
            ..*self
        };
        for cell in [east, west] {
            if cell != *self && !neighbors.contains(&cell) {
                neighbors.push(cell);
            }
        }

        neighbors
    }
}
