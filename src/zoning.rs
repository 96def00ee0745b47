//! Land-use zoning lookup (zone name, building coverage ratio, floor-area
//! ratio) by point-in-polygon over a zoning dataset.

use crate::error::{LoadError, LookupError};
use crate::geometry::{envelope_contains, point_in_multi_polygon};
use crate::indexer::{clamp_cell_deg, GridIndex};
use crate::loader::{
    first_number, first_text, polygon_features, read_feature_collection, DatasetSource,
    DefaultFetcher, Fetch,
};
use crate::structures::{JsonObject, PolygonFeature, ZoningAttributes, ZoningResult};
use geo::Coord;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const COMPONENT: &str = "ZoningLookup";
const DEFAULT_CELL_DEG: f64 = 0.01;

/// Ratio value meaning "unknown" in the source data.
pub const UNKNOWN_RATIO: f64 = 9999.0;
pub const UNNAMED_ZONE: &str = "(名称なし)";

const NAME_KEYS: &[&str] = &["A29_005", "name"];
const COVERAGE_KEYS: &[&str] = &["bcr", "A29_006"];
const FLOOR_AREA_KEYS: &[&str] = &["far", "A29_007"];

#[derive(Debug, Clone)]
pub struct ZoningConfig {
    pub source: DatasetSource,
    pub cell_deg: f64,
    /// Exclude points that fall inside a hole. Off for zoning: only outer
    /// rings of the converted dataset are trusted.
    pub respect_holes: bool,
}

impl Default for ZoningConfig {
    fn default() -> Self {
        Self {
            source: DatasetSource::Path(PathBuf::from(
                "datasets/zoning/hiroshima/A29_2019_34.geojson",
            )),
            cell_deg: DEFAULT_CELL_DEG,
            respect_holes: false,
        }
    }
}

struct Loaded {
    features: Vec<PolygonFeature<ZoningAttributes>>,
    grid: GridIndex,
    skipped: usize,
}

pub struct ZoningLookup {
    config: ZoningConfig,
    fetcher: Arc<dyn Fetch>,
    state: Option<Loaded>,
}

impl ZoningLookup {
    pub fn new(config: ZoningConfig) -> Self {
        Self::with_fetcher(config, Arc::new(DefaultFetcher::default()))
    }

    pub fn with_fetcher(mut config: ZoningConfig, fetcher: Arc<dyn Fetch>) -> Self {
        config.cell_deg = clamp_cell_deg(config.cell_deg, DEFAULT_CELL_DEG);
        Self {
            config,
            fetcher,
            state: None,
        }
    }

    pub fn config(&self) -> &ZoningConfig {
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

    /// Fetch, parse and index the dataset. A second call returns the cached
    /// count without fetching.
    pub fn load(&mut self) -> Result<usize, LoadError> {
        if let Some(state) = &self.state {
            return Ok(state.features.len());
        }

        let start = Instant::now();
        let collection = read_feature_collection(self.fetcher.as_ref(), &self.config.source)?;
        let parsed = polygon_features(&collection, zoning_attributes);
        let grid = GridIndex::build(&parsed.items, self.config.cell_deg);
        let skipped = parsed.skipped + grid.skipped();

        if skipped > 0 {
            warn!(skipped, source = %self.config.source, "zoning features skipped");
        }
        info!(
            features = parsed.items.len(),
            cells = grid.cell_count(),
            skipped,
            elapsed_ms = start.elapsed().as_millis(),
            "loaded zoning dataset"
        );

        let count = parsed.items.len();
        self.state = Some(Loaded {
            features: parsed.items,
            grid,
            skipped,
        });
        Ok(count)
    }

    /// Zone containing the point, or `None` outside every zone.
    ///
    /// Overlapping matches (shared edges, slivers) resolve to the polygon with
    /// the largest outer-ring area; equal areas keep dataset order.
    pub fn query(&self, lon: f64, lat: f64) -> Result<Option<ZoningResult>, LookupError> {
        let loaded = self
            .state
            .as_ref()
            .ok_or(LookupError::NotLoaded { component: COMPONENT })?;
        if !lon.is_finite() || !lat.is_finite() {
            return Ok(None);
        }

        let point = Coord { x: lon, y: lat };
        let mut best: Option<&PolygonFeature<ZoningAttributes>> = None;
        let mut matches = 0usize;

        for idx in loaded.grid.query_within(lon, lat, 0) {
            let feature = &loaded.features[idx];
            if !envelope_contains(&feature.envelope, point)
                || !point_in_multi_polygon(point, &feature.boundary, self.config.respect_holes)
            {
                continue;
            }
            matches += 1;
            if best.map_or(true, |b| feature.approx_area > b.approx_area) {
                best = Some(feature);
            }
        }

        if matches > 1 {
            debug!(lon, lat, matches, "overlapping zoning polygons, largest wins");
        }

        Ok(best.map(|f| ZoningResult {
            name: f.attributes.name.clone(),
            building_coverage_ratio: f.attributes.building_coverage_ratio,
            floor_area_ratio: f.attributes.floor_area_ratio,
            attributes: f.attributes.raw.clone(),
        }))
    }
}

fn ratio_or_none(v: Option<f64>) -> Option<f64> {
    v.filter(|r| *r != UNKNOWN_RATIO)
}

fn zoning_attributes(props: &JsonObject) -> ZoningAttributes {
    ZoningAttributes {
        name: first_text(props, NAME_KEYS).unwrap_or_else(|| UNNAMED_ZONE.to_owned()),
        building_coverage_ratio: ratio_or_none(first_number(props, COVERAGE_KEYS)),
        floor_area_ratio: ratio_or_none(first_number(props, FLOOR_AREA_KEYS)),
        raw: props.clone(),
    }
}
