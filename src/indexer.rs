use rstar::{RTreeObject, AABB};
use std::collections::{BTreeSet, HashMap};

/// Smallest accepted cell edge, in degrees.
pub const MIN_CELL_DEG: f64 = 0.001;

/// Largest cell row/col magnitude accepted. Keeps ring arithmetic around a
/// cell far from `i64` overflow.
const MAX_CELL_INDEX: f64 = (1u64 << 48) as f64;

/// `(row, col)` = `(floor(lat / cell_deg), floor(lon / cell_deg))`.
pub type CellKey = (i64, i64);

/// `None` for a non-finite coordinate or one too far out to index.
pub fn cell_key(lon: f64, lat: f64, cell_deg: f64) -> Option<CellKey> {
    let row = (lat / cell_deg).floor();
    let col = (lon / cell_deg).floor();
    let in_range = |v: f64| v.is_finite() && v.abs() <= MAX_CELL_INDEX;
    if !in_range(row) || !in_range(col) {
        return None;
    }
    Some((row as i64, col as i64))
}

/// A finite cell size no smaller than [`MIN_CELL_DEG`], or `fallback` when
/// `cell_deg` is not finite.
pub fn clamp_cell_deg(cell_deg: f64, fallback: f64) -> f64 {
    if cell_deg.is_finite() {
        cell_deg.max(MIN_CELL_DEG)
    } else {
        fallback.max(MIN_CELL_DEG)
    }
}

/// Uniform grid over item envelopes.
///
/// An item is registered in every cell its envelope overlaps, so a query
/// covering any of those cells sees it. Candidates still need an exact
/// geometry check.
#[derive(Debug, Clone)]
pub struct GridIndex {
    cell_deg: f64,
    cells: HashMap<CellKey, Vec<usize>>,
    /// Occupied rows and cols, `(min, max)` each.
    extent: Option<(CellKey, CellKey)>,
    indexed: usize,
    skipped: usize,
}

impl GridIndex {
    /// Callers pass a cell size already run through [`clamp_cell_deg`]; a
    /// non-finite value here falls back to [`MIN_CELL_DEG`].
    pub fn new(cell_deg: f64) -> Self {
        let cell_deg = clamp_cell_deg(cell_deg, MIN_CELL_DEG);
        Self {
            cell_deg,
            cells: HashMap::new(),
            extent: None,
            indexed: 0,
            skipped: 0,
        }
    }

    /// Index every item by position in `items`.
    pub fn build<T>(items: &[T], cell_deg: f64) -> Self
    where
        T: RTreeObject<Envelope = AABB<[f64; 2]>>,
    {
        let mut grid = Self::new(cell_deg);
        for (idx, item) in items.iter().enumerate() {
            grid.insert(idx, &item.envelope());
        }
        grid
    }

    /// Register `idx` under every cell overlapped by `envelope`.
    ///
    /// Returns `false` (and counts a skip) for a non-finite envelope.
    pub fn insert(&mut self, idx: usize, envelope: &AABB<[f64; 2]>) -> bool {
        let (lo, hi) = (envelope.lower(), envelope.upper());
        let (Some((row0, col0)), Some((row1, col1))) = (
            cell_key(lo[0], lo[1], self.cell_deg),
            cell_key(hi[0], hi[1], self.cell_deg),
        ) else {
            self.skipped += 1;
            return false;
        };

        for row in row0..=row1 {
            for col in col0..=col1 {
                self.cells.entry((row, col)).or_default().push(idx);
            }
        }
        self.extent = Some(match self.extent {
            None => ((row0, row1), (col0, col1)),
            Some(((r0, r1), (c0, c1))) => ((r0.min(row0), r1.max(row1)), (c0.min(col0), c1.max(col1))),
        });
        self.indexed += 1;
        true
    }

    pub fn cell_deg(&self) -> f64 {
        self.cell_deg
    }

    pub fn cell_of(&self, lon: f64, lat: f64) -> Option<CellKey> {
        cell_key(lon, lat, self.cell_deg)
    }

    /// Number of items registered.
    pub fn len(&self) -> usize {
        self.indexed
    }

    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }

    /// Items rejected by `insert`.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Ring radius past which no occupied cell lies, seen from the cell of
    /// `(lon, lat)`. `None` for an empty grid or a non-finite point.
    pub fn outermost_ring(&self, lon: f64, lat: f64) -> Option<u32> {
        let (row, col) = self.cell_of(lon, lat)?;
        let ((r0, r1), (c0, c1)) = self.extent?;
        let d = chebyshev((row, col), (r0, c0))
            .max(chebyshev((row, col), (r1, c1)))
            .max(chebyshev((row, col), (r0, c1)))
            .max(chebyshev((row, col), (r1, c0)));
        Some(u32::try_from(d).unwrap_or(u32::MAX))
    }

    /// Items in cells at Chebyshev distance exactly `radius` from the query
    /// cell, sorted and de-duplicated.
    pub fn query_ring(&self, lon: f64, lat: f64, radius: u32) -> Vec<usize> {
        self.collect(lon, lat, radius, true)
    }

    /// Items in cells at Chebyshev distance `0..=radius` from the query cell,
    /// sorted and de-duplicated.
    pub fn query_within(&self, lon: f64, lat: f64, radius: u32) -> Vec<usize> {
        self.collect(lon, lat, radius, false)
    }

    fn collect(&self, lon: f64, lat: f64, radius: u32, ring_only: bool) -> Vec<usize> {
        let Some(center) = self.cell_of(lon, lat) else {
            return Vec::new();
        };
        let r = i64::from(radius);
        let mut out = BTreeSet::new();

        let wanted = |key: &CellKey| {
            let d = chebyshev(center, *key);
            if ring_only {
                d == r
            } else {
                d <= r
            }
        };

        // Walking the square costs (2r+1)^2 lookups; past the number of
        // occupied cells it is cheaper to scan those instead.
        let side = 2 * r + 1;
        let walk_cost = if ring_only { 8 * r.max(1) } else { side.saturating_mul(side) };
        if walk_cost > self.cells.len() as i64 {
            for (key, items) in &self.cells {
                if wanted(key) {
                    out.extend(items.iter().copied());
                }
            }
        } else {
            for dr in -r..=r {
                for dc in -r..=r {
                    if ring_only && dr.abs() != r && dc.abs() != r {
                        continue;
                    }
                    let key = (center.0 + dr, center.1 + dc);
                    if let Some(items) = self.cells.get(&key) {
                        out.extend(items.iter().copied());
                    }
                }
            }
        }

        out.into_iter().collect()
    }
}

fn chebyshev(a: CellKey, b: CellKey) -> i64 {
    a.0.abs_diff(b.0).max(a.1.abs_diff(b.1)).min(i64::MAX as u64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pt([f64; 2]);

    impl RTreeObject for Pt {
        type Envelope = AABB<[f64; 2]>;

        fn envelope(&self) -> Self::Envelope {
            AABB::from_point(self.0)
        }
    }

    #[test]
    fn cell_key_floors_negative_coordinates() {
        assert_eq!(cell_key(132.455, 34.395, 0.01), Some((3439, 13245)));
        assert_eq!(cell_key(-0.005, -0.005, 0.01), Some((-1, -1)));
        assert_eq!(cell_key(f64::NAN, 0.0, 0.01), None);
        assert_eq!(cell_key(1e20, 34.39, 0.01), None);
        assert_eq!(cell_key(132.45, -1e300, 0.01), None);
    }

    #[test]
    fn far_out_points_are_neither_indexed_nor_queried() {
        let pts: Vec<Pt> = (0..12)
            .map(|i| Pt([132.40 + f64::from(i) * 0.02, 34.39]))
            .collect();
        let mut grid = GridIndex::build(&pts, 0.01);
        for r in 0..=8 {
            assert!(grid.query_ring(1e20, 34.39, r).is_empty());
            assert!(grid.query_within(132.45, 1e300, r).is_empty());
        }
        assert_eq!(grid.outermost_ring(1e20, 34.39), None);
        assert!(!grid.insert(12, &AABB::from_point([9e18, 34.39])));
        assert_eq!(grid.skipped(), 1);
    }

    #[test]
    fn box_is_registered_in_every_overlapped_cell() {
        let mut grid = GridIndex::new(1.0);
        assert!(grid.insert(7, &AABB::from_corners([0.5, 0.5], [2.5, 1.5])));
        assert_eq!(grid.cell_count(), 6);
        for (lon, lat) in [(0.1, 0.1), (2.9, 1.9), (1.5, 1.0)] {
            assert_eq!(grid.query_within(lon, lat, 0), vec![7]);
        }
        assert!(grid.query_within(3.5, 0.5, 0).is_empty());
    }

    #[test]
    fn non_finite_envelopes_are_skipped() {
        let mut grid = GridIndex::new(0.01);
        assert!(!grid.insert(0, &AABB::from_corners([f64::NAN, 0.0], [1.0, 1.0])));
        assert_eq!(grid.skipped(), 1);
        assert!(grid.is_empty());
    }

    #[test]
    fn ring_query_excludes_inner_cells() {
        let pts = vec![Pt([0.5, 0.5]), Pt([1.5, 0.5]), Pt([2.5, 2.5])];
        let grid = GridIndex::build(&pts, 1.0);
        assert_eq!(grid.query_ring(0.5, 0.5, 0), vec![0]);
        assert_eq!(grid.query_ring(0.5, 0.5, 1), vec![1]);
        assert_eq!(grid.query_ring(0.5, 0.5, 2), vec![2]);
        assert_eq!(grid.query_within(0.5, 0.5, 1), vec![0, 1]);
    }

    #[test]
    fn unbounded_query_returns_every_point() {
        let pts: Vec<Pt> = (0..500)
            .map(|i| {
                let f = f64::from(i);
                Pt([132.0 + (f * 0.37) % 1.2, 34.0 + (f * 0.53) % 0.9])
            })
            .collect();
        let grid = GridIndex::build(&pts, 0.01);
        let all = grid.query_within(132.5, 34.5, u32::MAX);
        assert_eq!(all, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn outermost_ring_reaches_the_farthest_occupied_cell() {
        let pts = vec![Pt([0.5, 0.5]), Pt([3.5, 1.5])];
        let grid = GridIndex::build(&pts, 1.0);
        assert_eq!(grid.outermost_ring(0.5, 0.5), Some(3));
        assert_eq!(grid.outermost_ring(-9.5, 0.5), Some(13));
        assert_eq!(GridIndex::new(1.0).outermost_ring(0.5, 0.5), None);
        assert_eq!(grid.outermost_ring(f64::NAN, 0.5), None);
    }

    #[test]
    fn tiny_cell_size_is_clamped() {
        assert_eq!(clamp_cell_deg(f64::NAN, 0.02), 0.02);
        assert_eq!(clamp_cell_deg(f64::INFINITY, 0.01), 0.01);
        assert_eq!(clamp_cell_deg(0.0001, 0.01), MIN_CELL_DEG);
        assert_eq!(GridIndex::new(0.0).cell_deg(), MIN_CELL_DEG);
        assert_eq!(GridIndex::new(f64::NAN).cell_deg(), MIN_CELL_DEG);
        assert_eq!(GridIndex::new(0.02).cell_deg(), 0.02);
    }
}
