//! Core coordinate types.

use std::fmt;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Deepest supported subdivision level.
///
/// At level 24 a cell is a few meters wide, far finer than any map query
/// radius. Rows and columns fit in 29 bits each at this depth.
pub const MAX_LEVEL: u8 = 24;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct LatLng {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lng: f64,
}

impl LatLng {
    /// Creates a new position.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns true if both components are finite and within WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (MIN_LON..=MAX_LON).contains(&self.lng)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

/// Stable identifier of a [`Cell`].
///
/// Packs `(level, row, col)` as `level << 58 | row << 29 | col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub u64);

impl CellId {
    const AXIS_BITS: u32 = 29;
    const AXIS_MASK: u64 = (1 << Self::AXIS_BITS) - 1;

    /// Unpacks the identifier back into a cell.
    pub fn to_cell(self) -> Cell {
        Cell {
            level: (self.0 >> (2 * Self::AXIS_BITS)) as u8,
            row: ((self.0 >> Self::AXIS_BITS) & Self::AXIS_MASK) as u32,
            col: (self.0 & Self::AXIS_MASK) as u32,
        }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A fixed-level region of the Web Mercator quadtree.
///
/// Cells compare, hash and order by their [`CellId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Row index (0 at the northern edge of the projection).
    pub row: u32,
    /// Column index (0 at the antimeridian, increasing eastwards).
    pub col: u32,
    /// Subdivision level (0 = whole world).
    pub level: u8,
}

impl Cell {
    /// Number of rows (and columns) at this cell's level.
    #[inline]
    pub fn span(&self) -> u32 {
        1u32 << self.level
    }

    /// Returns the stable identifier for this cell.
    #[inline]
    pub fn id(&self) -> CellId {
        CellId(
            ((self.level as u64) << (2 * CellId::AXIS_BITS))
                | ((self.row as u64) << CellId::AXIS_BITS)
                | self.col as u64,
        )
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id().cmp(&other.id())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}/{}/{}", self.level, self.row, self.col)
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside the valid range.
    InvalidLatitude(f64),
    /// Longitude is outside the valid range.
    InvalidLongitude(f64),
    /// Subdivision level is deeper than [`MAX_LEVEL`].
    InvalidLevel(u8),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lng) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between -180 and 180)",
                    lng
                )
            }
            CoordError::InvalidLevel(level) => {
                write!(
                    f,
                    "Invalid subdivision level: {} (must be at most {})",
                    level, MAX_LEVEL
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}
