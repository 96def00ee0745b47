//! Geometry kernel shared by the lookups.
//!
//! Everything here runs inside tight query loops, so malformed input never
//! panics or errors: it yields `false`, `0.0`, `None` or `f64::INFINITY`.

use geo::{Coord, MultiPolygon, Polygon};
use rstar::{Envelope, AABB};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Substituted for a zero latitude delta on an edge before dividing.
const RING_EPSILON: f64 = 1e-12;

/// Even-odd ray casting against a single ring.
///
/// The ray runs east from `point`; an edge counts as crossed when exactly one
/// of its endpoints lies strictly north of the point.
pub fn point_in_ring(point: Coord<f64>, ring: &[Coord<f64>]) -> bool {
    if !point.x.is_finite() || !point.y.is_finite() || ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let mut dy = b.y - a.y;
            if dy == 0.0 {
                dy = RING_EPSILON;
            }
            let x_cross = (b.x - a.x) * (point.y - a.y) / dy + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Outer ring containment, optionally excluding points that fall in a hole.
pub fn point_in_polygon(point: Coord<f64>, polygon: &Polygon<f64>, respect_holes: bool) -> bool {
    if !point_in_ring(point, &polygon.exterior().0) {
        return false;
    }
    if respect_holes {
        return !polygon
            .interiors()
            .iter()
            .any(|hole| point_in_ring(point, &hole.0));
    }
    true
}

pub fn point_in_multi_polygon(
    point: Coord<f64>,
    shape: &MultiPolygon<f64>,
    respect_holes: bool,
) -> bool {
    shape
        .0
        .iter()
        .any(|polygon| point_in_polygon(point, polygon, respect_holes))
}

/// Min/max over every vertex of every ring, holes included.
///
/// Returns `None` for an empty shape or one carrying a non-finite vertex.
pub fn bounding_box(shape: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    let mut lo = [f64::INFINITY, f64::INFINITY];
    let mut hi = [f64::NEG_INFINITY, f64::NEG_INFINITY];
    let mut seen = false;

    for polygon in &shape.0 {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        for c in rings.flat_map(|ring| ring.0.iter()) {
            if !c.x.is_finite() || !c.y.is_finite() {
                return None;
            }
            lo = [lo[0].min(c.x), lo[1].min(c.y)];
            hi = [hi[0].max(c.x), hi[1].max(c.y)];
            seen = true;
        }
    }

    seen.then(|| AABB::from_corners(lo, hi))
}

pub fn envelope_contains(envelope: &AABB<[f64; 2]>, point: Coord<f64>) -> bool {
    envelope.contains_point(&[point.x, point.y])
}

/// Shoelace area of the outer ring, in squared degrees. Holes are ignored.
pub fn approx_area(polygon: &Polygon<f64>) -> f64 {
    let ring = &polygon.exterior().0;
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        sum += ring[j].x * ring[i].y - ring[i].x * ring[j].y;
        j = i;
    }
    let area = sum.abs() / 2.0;
    if area.is_finite() {
        area
    } else {
        0.0
    }
}

/// Sum of the outer-ring areas of every member polygon.
pub fn approx_area_multi(shape: &MultiPolygon<f64>) -> f64 {
    shape.0.iter().map(approx_area).sum()
}

pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if ![lat1, lon1, lat2, lon2].iter().all(|v| v.is_finite()) {
        return f64::INFINITY;
    }
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}
