use crate::geometry::{approx_area_multi, bounding_box};
use geo::MultiPolygon;
use rstar::{RTreeObject, AABB};
use serde::{Deserialize, Serialize};

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// One polygon feature of a zoning or hazard dataset.
///
/// Immutable after load. `envelope` and `approx_area` are derived once from
/// `boundary`.
#[derive(Debug, Clone)]
pub struct PolygonFeature<A> {
    pub boundary: MultiPolygon<f64>,
    pub attributes: A,
    pub envelope: AABB<[f64; 2]>,
    /// Outer rings only; used to break ties between overlapping matches.
    pub approx_area: f64,
}

impl<A> PolygonFeature<A> {
    /// `None` when the boundary has no finite vertices.
    pub fn new(boundary: MultiPolygon<f64>, attributes: A) -> Option<Self> {
        let envelope = bounding_box(&boundary)?;
        let approx_area = approx_area_multi(&boundary);
        Some(Self {
            boundary,
            attributes,
            envelope,
            approx_area,
        })
    }
}

impl<A> RTreeObject for PolygonFeature<A> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct ZoningAttributes {
    pub name: String,
    /// `None` when absent, non-numeric or the 9999 "unknown" sentinel.
    pub building_coverage_ratio: Option<f64>,
    pub floor_area_ratio: Option<f64>,
    pub raw: JsonObject,
}

#[derive(Debug, Clone, Default)]
pub struct HazardAttributes {
    /// Free-text inundation depth, e.g. `"0.5～3.0m"`.
    pub water_depth: String,
    pub river_name: String,
    pub creating_type: String,
}

/// One rail stop.
#[derive(Debug, Clone)]
pub struct Station {
    pub coordinate: LonLat,
    pub name: String,
    pub line_name: String,
    pub operator_name: String,
    pub ridership: Option<f64>,
}

impl RTreeObject for Station {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.coordinate.lon, self.coordinate.lat])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoningResult {
    pub name: String,
    pub building_coverage_ratio: Option<f64>,
    pub floor_area_ratio: Option<f64>,
    pub attributes: JsonObject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationResult {
    pub name: String,
    pub line: String,
    pub operator: String,
    pub ridership: Option<f64>,
    pub coordinate: LonLat,
    pub distance_meters: f64,
}

/// Numeric range parsed from a depth text. `label` is `None` when the text
/// could not be classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthClass {
    pub min: f64,
    pub max: f64,
    pub label: Option<String>,
}

impl DepthClass {
    pub fn unclassified() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            label: None,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.label.is_some()
    }
}

/// Row of the depth → value factor table. Rows are matched on `min`,
/// deepest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRow {
    pub min: f64,
    pub label: String,
    pub factor: f64,
}

impl FactorRow {
    pub fn new(min: f64, label: &str, factor: f64) -> Self {
        Self {
            min,
            label: label.to_owned(),
            factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloodSample {
    pub river_name: String,
    pub water_depth: String,
    /// Scenario the extent was modelled for (planned scale, maximum, ...).
    pub creating_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloodResult {
    pub in_flood: bool,
    /// Label of the deepest class among the inspected matches.
    pub depth_class: Option<String>,
    pub depth: Option<DepthClass>,
    pub factor: f64,
    pub reasons: Vec<String>,
    pub match_count: usize,
    pub sample: Vec<FloodSample>,
}

impl FloodResult {
    pub fn outside(reason: &str) -> Self {
        Self {
            in_flood: false,
            depth_class: None,
            depth: None,
            factor: 1.0,
            reasons: vec![reason.to_owned()],
            match_count: 0,
            sample: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    pub input: LonLat,
    pub zoning: Option<ZoningResult>,
    pub stations: Vec<StationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flood: Option<FloodResult>,
}
