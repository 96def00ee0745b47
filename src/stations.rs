//! Nearest rail stations around a point, with optional ridership.

use crate::error::{LoadError, LookupError};
use crate::geometry::haversine_meters;
use crate::indexer::{clamp_cell_deg, GridIndex};
use crate::loader::{
    first_number, first_text, point_features, read_feature_collection, DatasetSource,
    DefaultFetcher, Fetch,
};
use crate::structures::{JsonObject, LonLat, Station, StationResult};
use rstar::AABB;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const COMPONENT: &str = "StationProximitySearch";
const DEFAULT_CELL_DEG: f64 = 0.01;

const NAME_KEYS: &[&str] = &["N02_005", "S12_name", "name"];
const LINE_KEYS: &[&str] = &["N02_003", "S12_line", "line"];
const OPERATOR_KEYS: &[&str] = &["N02_004", "S12_operator", "operator"];
const RIDERSHIP_KEYS: &[&str] = &["ridership_2022", "ridership"];

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub source: DatasetSource,
    pub cell_deg: f64,
    /// Outermost ring searched by `nearest`, in cells (8 cells ≈ 8 km at
    /// the default cell size). Rings past the last occupied cell are never
    /// visited, so `u32::MAX` means "everything".
    pub max_ring_radius: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            source: DatasetSource::Path(PathBuf::from(
                "datasets/rail/s12/hiroshima/stations_with_ridership.geojson",
            )),
            cell_deg: DEFAULT_CELL_DEG,
            max_ring_radius: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NearestOptions {
    pub k: usize,
    pub max_meters: f64,
    /// Case-insensitive substring filter on the operator name.
    pub operator_like: Option<String>,
    /// Case-insensitive substring filter on the line name.
    pub line_like: Option<String>,
    /// Stop widening the search once `k * multiplier` stations are within
    /// range. A closer station in a later ring can then be missed; `None`
    /// searches every ring up to `max_ring_radius`.
    pub early_exit_multiplier: Option<usize>,
}

impl Default for NearestOptions {
    fn default() -> Self {
        Self {
            k: 5,
            max_meters: 20_000.0,
            operator_like: None,
            line_like: None,
            early_exit_multiplier: Some(2),
        }
    }
}

impl NearestOptions {
    pub fn exhaustive(mut self) -> Self {
        self.early_exit_multiplier = None;
        self
    }
}

struct Loaded {
    stations: Vec<Station>,
    grid: GridIndex,
    skipped: usize,
    bounds: Option<AABB<[f64; 2]>>,
}

pub struct StationProximitySearch {
    config: StationConfig,
    fetcher: Arc<dyn Fetch>,
    state: Option<Loaded>,
}

impl StationProximitySearch {
    pub fn new(config: StationConfig) -> Self {
        Self::with_fetcher(config, Arc::new(DefaultFetcher::default()))
    }

    pub fn with_fetcher(mut config: StationConfig, fetcher: Arc<dyn Fetch>) -> Self {
        config.cell_deg = clamp_cell_deg(config.cell_deg, DEFAULT_CELL_DEG);
        Self {
            config,
            fetcher,
            state: None,
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.stations.len())
    }

    pub fn skipped(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.skipped)
    }

    /// Extent of all loaded stations.
    pub fn bounds(&self) -> Option<AABB<[f64; 2]>> {
        self.state.as_ref().and_then(|s| s.bounds)
    }

    /// Fetch, parse and index the dataset. No-op once loaded.
    pub fn load(&mut self) -> Result<usize, LoadError> {
        if let Some(state) = &self.state {
            return Ok(state.stations.len());
        }

        let start = Instant::now();
        let collection = read_feature_collection(self.fetcher.as_ref(), &self.config.source)?;
        let parsed = point_features(&collection, station_from);
        let grid = GridIndex::build(&parsed.items, self.config.cell_deg);
        let skipped = parsed.skipped + grid.skipped();
        let bounds = bounds_of(&parsed.items);
        let with_ridership = parsed.items.iter().filter(|s| s.ridership.is_some()).count();

        if skipped > 0 {
            warn!(skipped, source = %self.config.source, "station features skipped");
        }
        info!(
            stations = parsed.items.len(),
            with_ridership,
            cells = grid.cell_count(),
            skipped,
            elapsed_ms = start.elapsed().as_millis(),
            "loaded station dataset"
        );

        let count = parsed.items.len();
        self.state = Some(Loaded {
            stations: parsed.items,
            grid,
            skipped,
            bounds,
        });
        Ok(count)
    }

    /// Up to `k` stations within `max_meters`, nearest first.
    pub fn nearest(
        &self,
        lon: f64,
        lat: f64,
        opts: &NearestOptions,
    ) -> Result<Vec<StationResult>, LookupError> {
        let loaded = self
            .state
            .as_ref()
            .ok_or(LookupError::NotLoaded { component: COMPONENT })?;
        if !lon.is_finite() || !lat.is_finite() {
            return Ok(Vec::new());
        }

        let k = opts.k.max(1);
        let max_meters = opts.max_meters.max(1.0);
        let operator_like = like_pattern(opts.operator_like.as_deref());
        let line_like = like_pattern(opts.line_like.as_deref());
        let early_exit = opts.early_exit_multiplier.map(|m| k.saturating_mul(m.max(1)));

        let last_ring = loaded
            .grid
            .outermost_ring(lon, lat)
            .map_or(0, |r| r.min(self.config.max_ring_radius));

        let mut found: Vec<(usize, f64)> = Vec::new();
        let mut rings = 0;
        for radius in 0..=last_ring {
            rings += 1;
            for idx in loaded.grid.query_ring(lon, lat, radius) {
                let s = &loaded.stations[idx];
                if !matches_like(&s.operator_name, operator_like.as_deref())
                    || !matches_like(&s.line_name, line_like.as_deref())
                {
                    continue;
                }
                let d = haversine_meters(lat, lon, s.coordinate.lat, s.coordinate.lon);
                if d <= max_meters {
                    found.push((idx, d));
                }
            }
            if early_exit.is_some_and(|n| found.len() >= n) {
                break;
            }
        }

        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found.truncate(k);
        debug!(lon, lat, rings, returned = found.len(), "nearest stations");

        Ok(found
            .into_iter()
            .map(|(idx, d)| {
                let s = &loaded.stations[idx];
                StationResult {
                    name: s.name.clone(),
                    line: s.line_name.clone(),
                    operator: s.operator_name.clone(),
                    ridership: s.ridership,
                    coordinate: s.coordinate,
                    distance_meters: d,
                }
            })
            .collect())
    }

    /// Stations whose name contains `query` (case-insensitive), in dataset
    /// order.
    pub fn search_by_name(&self, query: &str, limit: usize) -> Result<Vec<&Station>, LookupError> {
        let loaded = self
            .state
            .as_ref()
            .ok_or(LookupError::NotLoaded { component: COMPONENT })?;
        let Some(q) = like_pattern(Some(query)) else {
            return Ok(Vec::new());
        };
        Ok(loaded
            .stations
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&q))
            .take(limit)
            .collect())
    }
}

fn like_pattern(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

fn matches_like(value: &str, pattern: Option<&str>) -> bool {
    pattern.map_or(true, |p| value.to_lowercase().contains(p))
}

fn bounds_of(stations: &[Station]) -> Option<AABB<[f64; 2]>> {
    let points: Vec<[f64; 2]> = stations
        .iter()
        .filter(|s| s.coordinate.is_finite())
        .map(|s| [s.coordinate.lon, s.coordinate.lat])
        .collect();
    (!points.is_empty()).then(|| AABB::from_points(points.iter()))
}

fn station_from(coordinate: LonLat, props: &JsonObject) -> Station {
    Station {
        coordinate,
        name: first_text(props, NAME_KEYS).unwrap_or_default(),
        line_name: first_text(props, LINE_KEYS).unwrap_or_default(),
        operator_name: first_text(props, OPERATOR_KEYS).unwrap_or_default(),
        ridership: first_number(props, RIDERSHIP_KEYS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_ignore_case_and_blank_input() {
        assert_eq!(like_pattern(Some("  JR ")), Some("jr".to_owned()));
        assert_eq!(like_pattern(Some("   ")), None);
        assert!(matches_like("JR西日本", Some("jr")));
        assert!(!matches_like("広島電鉄", Some("jr")));
        assert!(matches_like("広島電鉄", None));
    }

    #[test]
    fn bounds_cover_all_stations() {
        let st = |lon, lat| Station {
            coordinate: LonLat::new(lon, lat),
            name: String::new(),
            line_name: String::new(),
            operator_name: String::new(),
            ridership: None,
        };
        let b = bounds_of(&[st(132.4, 34.5), st(132.6, 34.3)]).unwrap();
        assert_eq!(b.lower(), [132.4, 34.3]);
        assert_eq!(b.upper(), [132.6, 34.5]);
        assert!(bounds_of(&[]).is_none());
    }
}
