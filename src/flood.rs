//! Flood inundation lookup: containment against flood-extent polygons and
//! a value factor derived from the deepest expected water depth.

use crate::depth::{classify_depth, deepest, default_factor_table, factor_for, sort_factor_table};
use crate::error::{LoadError, LookupError};
use crate::geometry::{envelope_contains, point_in_multi_polygon};
use crate::indexer::{clamp_cell_deg, GridIndex};
use crate::loader::{
    first_text, polygon_features, read_feature_collection, DatasetSource, DefaultFetcher, Fetch,
};
use crate::structures::{
    DepthClass, FactorRow, FloodResult, FloodSample, HazardAttributes, JsonObject, PolygonFeature,
};
use geo::Coord;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const COMPONENT: &str = "FloodHazardLookup";
const DEFAULT_CELL_DEG: f64 = 0.02;

const WATER_DEPTH_KEYS: &[&str] = &["waterDepth", "water_depth"];
const RIVER_NAME_KEYS: &[&str] = &["riverName", "river_name"];
const CREATING_TYPE_KEYS: &[&str] = &["creatingType", "creating_type"];

pub const REASON_INVALID: &str = "invalid coordinate";
pub const REASON_OUTSIDE: &str = "outside any flood inundation area";
pub const REASON_INSIDE: &str = "inside a flood inundation area";
pub const REASON_DEPTH_UNKNOWN: &str = "depth class unknown (no usable depth attribute)";

#[derive(Debug, Clone)]
pub struct FloodConfig {
    pub source: DatasetSource,
    /// Grid cell edge in degrees. Flood extents are large, so this is
    /// coarser than the other datasets.
    pub cell_deg: f64,
    /// Deepest first; re-sorted on construction and `configure`.
    pub factor_table: Vec<FactorRow>,
    pub respect_holes: bool,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            source: DatasetSource::Path(PathBuf::from(
                "datasets/hazard/flood/hiroshima/flood_2024_river.geojson",
            )),
            cell_deg: DEFAULT_CELL_DEG,
            factor_table: default_factor_table(),
            respect_holes: true,
        }
    }
}

/// Partial update applied by [`FloodHazardLookup::configure`].
#[derive(Debug, Clone, Default)]
pub struct FloodOverrides {
    pub source: Option<DatasetSource>,
    pub cell_deg: Option<f64>,
    pub factor_table: Option<Vec<FactorRow>>,
}

#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    /// Largest ring (in cells) visited around the query cell.
    pub search_radius_cells: u32,
    /// Stop after this many confirmed matches.
    pub limit: usize,
    /// Matches inspected, in discovery order, when picking the deepest class.
    pub depth_scan_limit: usize,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            search_radius_cells: 2,
            limit: 200,
            depth_scan_limit: 8,
        }
    }
}

struct Loaded {
    features: Vec<PolygonFeature<HazardAttributes>>,
    grid: GridIndex,
    skipped: usize,
}

pub struct FloodHazardLookup {
    config: FloodConfig,
    fetcher: Arc<dyn Fetch>,
    state: Option<Loaded>,
}

impl FloodHazardLookup {
    pub fn new(config: FloodConfig) -> Self {
        Self::with_fetcher(config, Arc::new(DefaultFetcher::default()))
    }

    pub fn with_fetcher(mut config: FloodConfig, fetcher: Arc<dyn Fetch>) -> Self {
        config.cell_deg = clamp_cell_deg(config.cell_deg, DEFAULT_CELL_DEG);
        sort_factor_table(&mut config.factor_table);
        Self {
            config,
            fetcher,
            state: None,
        }
    }

    /// Apply overrides. A new source or cell size drops the loaded index;
    /// a new factor table takes effect on the next `evaluate`.
    pub fn configure(&mut self, overrides: FloodOverrides) {
        let mut invalidate = false;

        if let Some(source) = overrides.source {
            invalidate |= source != self.config.source;
            self.config.source = source;
        }
        if let Some(cell_deg) = overrides.cell_deg.filter(|d| d.is_finite()) {
            let cell_deg = clamp_cell_deg(cell_deg, DEFAULT_CELL_DEG);
            invalidate |= cell_deg != self.config.cell_deg;
            self.config.cell_deg = cell_deg;
        }
        if let Some(mut table) = overrides.factor_table.filter(|t| !t.is_empty()) {
            sort_factor_table(&mut table);
            self.config.factor_table = table;
        }

        if invalidate && self.state.take().is_some() {
            debug!(source = %self.config.source, cell_deg = self.config.cell_deg, "flood index discarded after reconfigure");
        }
    }

    pub fn config(&self) -> &FloodConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.features.len())
    }

    pub fn skipped(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.skipped)
    }

    /// Fetch, parse and index the dataset. No-op once loaded.
    pub fn load(&mut self) -> Result<usize, LoadError> {
        if let Some(state) = &self.state {
            return Ok(state.features.len());
        }

        let start = Instant::now();
        let collection = read_feature_collection(self.fetcher.as_ref(), &self.config.source)?;
        let parsed = polygon_features(&collection, hazard_attributes);
        let grid = GridIndex::build(&parsed.items, self.config.cell_deg);
        let skipped = parsed.skipped + grid.skipped();

        if skipped > 0 {
            warn!(skipped, source = %self.config.source, "flood features skipped");
        }
        info!(
            features = parsed.items.len(),
            cells = grid.cell_count(),
            skipped,
            elapsed_ms = start.elapsed().as_millis(),
            "loaded flood dataset"
        );

        let count = parsed.items.len();
        self.state = Some(Loaded {
            features: parsed.items,
            grid,
            skipped,
        });
        Ok(count)
    }

    /// Flood exposure and value factor at one point.
    pub fn evaluate(
        &self,
        lon: f64,
        lat: f64,
        opts: &EvaluateOptions,
    ) -> Result<FloodResult, LookupError> {
        let loaded = self
            .state
            .as_ref()
            .ok_or(LookupError::NotLoaded { component: COMPONENT })?;
        if !lon.is_finite() || !lat.is_finite() {
            return Ok(FloodResult::outside(REASON_INVALID));
        }

        let point = Coord { x: lon, y: lat };
        let limit = opts.limit.max(1);
        let mut seen = HashSet::new();
        let mut hits: Vec<&HazardAttributes> = Vec::new();

        'rings: for radius in 0..=opts.search_radius_cells {
            for idx in loaded.grid.query_ring(lon, lat, radius) {
                if !seen.insert(idx) {
                    continue;
                }
                let feature = &loaded.features[idx];
                if !envelope_contains(&feature.envelope, point) {
                    continue;
                }
                if point_in_multi_polygon(point, &feature.boundary, self.config.respect_holes) {
                    hits.push(&feature.attributes);
                    if hits.len() >= limit {
                        break 'rings;
                    }
                }
            }
        }

        if hits.is_empty() {
            return Ok(FloodResult::outside(REASON_OUTSIDE));
        }

        let inspected = &hits[..hits.len().min(opts.depth_scan_limit.max(1))];
        let classes: Vec<DepthClass> = inspected
            .iter()
            .map(|h| classify_depth(&h.water_depth))
            .collect();
        let sample = inspected
            .iter()
            .map(|h| FloodSample {
                river_name: h.river_name.clone(),
                water_depth: h.water_depth.clone(),
                creating_type: h.creating_type.clone(),
            })
            .collect();

        let best = deepest(&classes);
        let factor = best
            .as_ref()
            .map_or(1.0, |b| factor_for(b, &self.config.factor_table));
        let depth_class = best.as_ref().and_then(|b| b.label.clone());
        let depth_reason = depth_class
            .as_ref()
            .map_or_else(|| REASON_DEPTH_UNKNOWN.to_owned(), |l| format!("depth class: {l}"));

        debug!(lon, lat, matches = hits.len(), ?depth_class, factor, "flood evaluated");

        Ok(FloodResult {
            in_flood: true,
            depth_class,
            depth: best,
            factor,
            reasons: vec![REASON_INSIDE.to_owned(), depth_reason],
            match_count: hits.len(),
            sample,
        })
    }
}

fn hazard_attributes(props: &JsonObject) -> HazardAttributes {
    HazardAttributes {
        water_depth: first_text(props, WATER_DEPTH_KEYS).unwrap_or_default(),
        river_name: first_text(props, RIVER_NAME_KEYS).unwrap_or_default(),
        creating_type: first_text(props, CREATING_TYPE_KEYS).unwrap_or_default(),
    }
}
