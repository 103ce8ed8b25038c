//! Survey area geometry.
//!
//! Polygons are treated as planar in latitude/longitude degrees. Areas are
//! city-scale, so the distortion of that approximation is far below one
//! cell at the levels the scanner uses.

use crate::coord::LatLng;

/// A closed polygon given by its vertices in order.
///
/// The closing edge from the last vertex back to the first is implicit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    vertices: Vec<LatLng>,
}

impl Polygon {
    /// Creates a polygon from its vertices.
    pub fn new(vertices: Vec<LatLng>) -> Self {
        Self { vertices }
    }

    /// Returns the vertices in order.
    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    /// Returns true if the polygon has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Arithmetic mean of the vertices.
    ///
    /// An empty polygon has its centroid at `(0, 0)`.
    pub fn centroid(&self) -> LatLng {
        if self.vertices.is_empty() {
            return LatLng::default();
        }

        let count = self.vertices.len() as f64;
        let (lat_sum, lng_sum) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(lat, lng), v| (lat + v.lat, lng + v.lng));

        LatLng::new(lat_sum / count, lng_sum / count)
    }

    /// Even-odd point-in-polygon test.
    ///
    /// Casts a ray towards increasing longitude and counts edge crossings.
    /// Polygons with fewer than three vertices contain nothing.
    pub fn contains(&self, point: LatLng) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let a = self.vertices[i];
            let b = self.vertices[j];

            if (a.lat > point.lat) != (b.lat > point.lat) {
                let crossing = a.lng + (point.lat - a.lat) / (b.lat - a.lat) * (b.lng - a.lng);
                if point.lng < crossing {
                    inside = !inside;
                }
            }
            j = i;
        }

        inside
    }
}

/// A named survey area.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    /// Display name, unique within a configuration.
    pub name: String,
    /// Boundary of the area.
    pub polygon: Polygon,
}

impl Area {
    /// Creates a new area.
    pub fn new(name: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            name: name.into(),
            polygon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(1.0, 0.0),
        ])
    }

    #[test]
    fn test_centroid_is_vertex_mean() {
        let c = square().centroid();
        assert!((c.lat - 0.5).abs() < 1e-12);
        assert!((c.lng - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_polygon_centroid_is_origin() {
        assert_eq!(Polygon::default().centroid(), LatLng::new(0.0, 0.0));
    }

    #[test]
    fn test_contains_interior_point() {
        assert!(square().contains(LatLng::new(0.5, 0.5)));
        assert!(square().contains(LatLng::new(0.01, 0.99)));
    }

    #[test]
    fn test_rejects_exterior_points() {
        let polygon = square();
        assert!(!polygon.contains(LatLng::new(1.5, 0.5)));
        assert!(!polygon.contains(LatLng::new(0.5, -0.1)));
        assert!(!polygon.contains(LatLng::new(-3.0, -3.0)));
    }

    #[test]
    fn test_concave_polygon_notch_is_outside() {
        // U shape opening northwards
        let polygon = Polygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 3.0),
            LatLng::new(3.0, 3.0),
            LatLng::new(3.0, 2.0),
            LatLng::new(1.0, 2.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(3.0, 1.0),
            LatLng::new(3.0, 0.0),
        ]);

        assert!(polygon.contains(LatLng::new(2.0, 0.5)));
        assert!(polygon.contains(LatLng::new(2.0, 2.5)));
        assert!(!polygon.contains(LatLng::new(2.0, 1.5)));
        assert!(polygon.contains(LatLng::new(0.5, 1.5)));
    }

    #[test]
    fn test_degenerate_polygons_contain_nothing() {
        let point = Polygon::new(vec![LatLng::new(1.0, 1.0)]);
        assert!(!point.contains(LatLng::new(1.0, 1.0)));

        let segment = Polygon::new(vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)]);
        assert!(!segment.contains(LatLng::new(0.5, 0.5)));
    }
}
