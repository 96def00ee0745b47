mod common;

use common::{collection, polygon, ring, source, square, MemoryFetcher};
use serde_json::{json, Value};
use std::sync::Arc;
use valuation_features::flood::{REASON_INVALID, REASON_OUTSIDE};
use valuation_features::{
    EvaluateOptions, FactorRow, FloodConfig, FloodHazardLookup, FloodOverrides, LookupError,
};

const LON: f64 = 132.455;
const LAT: f64 = 34.395;

fn depth(text: &str) -> Value {
    json!({"waterDepth": text, "riverName": "太田川"})
}

fn loaded(data: Value) -> (FloodHazardLookup, Arc<MemoryFetcher>) {
    let fetcher = MemoryFetcher::new().with("flood.geojson", data).shared();
    let mut flood = FloodHazardLookup::with_fetcher(
        FloodConfig {
            source: source("flood.geojson"),
            ..FloodConfig::default()
        },
        fetcher.clone(),
    );
    flood.load().unwrap();
    (flood, fetcher)
}

#[test]
fn outside_every_area_has_neutral_factor() {
    let (flood, _) = loaded(collection(vec![square(132.40, 34.30, 132.41, 34.31, depth("3m程度"))]));
    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert!(!r.in_flood);
    assert_eq!(r.factor, 1.0);
    assert_eq!(r.match_count, 0);
    assert_eq!(r.reasons, vec![REASON_OUTSIDE.to_owned()]);
}

#[test]
fn range_depth_maps_to_table_factor() {
    let (flood, _) = loaded(collection(vec![square(132.45, 34.39, 132.46, 34.40, depth("0.5～3.0m"))]));
    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert!(r.in_flood);
    assert_eq!(r.depth_class.as_deref(), Some("0.5–3m"));
    assert_eq!(r.factor, 0.90);
    assert_eq!(r.match_count, 1);
    assert_eq!(r.sample[0].river_name, "太田川");
    assert_eq!(r.sample[0].water_depth, "0.5～3.0m");
}

#[test]
fn seven_metres_falls_in_five_metre_bucket() {
    let (flood, _) = loaded(collection(vec![square(132.45, 34.39, 132.46, 34.40, depth("7m程度"))]));
    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert_eq!(r.depth.as_ref().map(|d| d.min), Some(7.0));
    assert_eq!(r.factor, 0.80);
}

#[test]
fn deepest_overlapping_area_decides() {
    let (flood, _) = loaded(collection(vec![
        square(132.45, 34.39, 132.46, 34.40, depth("0.5m未満")),
        square(132.44, 34.38, 132.47, 34.41, depth("10m以上")),
        square(132.45, 34.39, 132.46, 34.40, depth("3.0～5.0m")),
    ]));
    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert_eq!(r.match_count, 3);
    assert_eq!(r.depth_class.as_deref(), Some("10m以上"));
    assert_eq!(r.factor, 0.70);
}

#[test]
fn unclassifiable_depth_is_in_flood_with_neutral_factor() {
    let (flood, _) = loaded(collection(vec![square(132.45, 34.39, 132.46, 34.40, depth("unknown-text"))]));
    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert!(r.in_flood);
    assert_eq!(r.depth_class, None);
    assert_eq!(r.factor, 1.0);
    assert_eq!(r.reasons.len(), 2);
}

#[test]
fn only_first_matches_are_inspected_for_depth() {
    let mut features: Vec<Value> = (0..8)
        .map(|_| square(132.45, 34.39, 132.46, 34.40, depth("0.5m未満")))
        .collect();
    features.push(square(132.45, 34.39, 132.46, 34.40, depth("10m以上")));
    let (flood, _) = loaded(collection(features));

    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert_eq!(r.match_count, 9);
    assert_eq!(r.sample.len(), 8);
    assert_eq!(r.depth_class.as_deref(), Some("0–0.5m"));
    assert_eq!(r.factor, 0.97);

    let wide = EvaluateOptions {
        depth_scan_limit: 9,
        ..EvaluateOptions::default()
    };
    let r = flood.evaluate(LON, LAT, &wide).unwrap();
    assert_eq!(r.depth_class.as_deref(), Some("10m以上"));
}

#[test]
fn match_limit_caps_confirmed_matches() {
    let features = (0..10)
        .map(|_| square(132.45, 34.39, 132.46, 34.40, depth("1m")))
        .collect();
    let (flood, _) = loaded(collection(features));
    let opts = EvaluateOptions {
        limit: 3,
        ..EvaluateOptions::default()
    };
    assert_eq!(flood.evaluate(LON, LAT, &opts).unwrap().match_count, 3);
}

#[test]
fn multipolygon_members_are_all_checked() {
    let feature = json!({
        "type": "Feature",
        "properties": depth("5.0～10.0m"),
        "geometry": {"type": "MultiPolygon", "coordinates": [
            [ring(132.40, 34.30, 132.41, 34.31)],
            [ring(132.45, 34.39, 132.46, 34.40)]
        ]}
    });
    let (flood, _) = loaded(collection(vec![feature]));
    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert!(r.in_flood);
    assert_eq!(r.factor, 0.80);
}

#[test]
fn invalid_coordinate_and_missing_load() {
    let (flood, _) = loaded(collection(vec![square(132.45, 34.39, 132.46, 34.40, depth("1m"))]));
    let r = flood.evaluate(f64::NAN, LAT, &EvaluateOptions::default()).unwrap();
    assert!(!r.in_flood);
    assert_eq!(r.reasons, vec![REASON_INVALID.to_owned()]);

    let unloaded = FloodHazardLookup::with_fetcher(FloodConfig::default(), MemoryFetcher::new().shared());
    assert!(matches!(
        unloaded.evaluate(LON, LAT, &EvaluateOptions::default()),
        Err(LookupError::NotLoaded { .. })
    ));
}

#[test]
fn far_out_coordinates_are_outside() {
    let features = (0..12)
        .map(|i| {
            let x = 132.40 + f64::from(i) * 0.02;
            square(x, 34.39, x + 0.01, 34.40, depth("1m"))
        })
        .collect();
    let (flood, _) = loaded(collection(features));
    let opts = EvaluateOptions::default();

    let r = flood.evaluate(132.45, 1e300, &opts).unwrap();
    assert!(!r.in_flood);
    assert_eq!(r.factor, 1.0);
    assert!(!flood.evaluate(1e20, 34.395, &opts).unwrap().in_flood);
}

#[test]
fn sample_carries_the_scenario_type() {
    let props = json!({"waterDepth": "3m程度", "riverName": "太田川", "creatingType": "想定最大規模"});
    let (flood, _) = loaded(collection(vec![square(132.45, 34.39, 132.46, 34.40, props)]));
    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert_eq!(r.sample[0].creating_type, "想定最大規模");

    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["sample"][0]["creating_type"], json!("想定最大規模"));
}

#[test]
fn configure_swaps_factor_table_without_reloading() {
    let (mut flood, fetcher) =
        loaded(collection(vec![square(132.45, 34.39, 132.46, 34.40, depth("0.5～3.0m"))]));

    flood.configure(FloodOverrides {
        factor_table: Some(vec![
            FactorRow::new(0.0, "any", 0.95),
            FactorRow::new(0.5, "half metre", 0.5),
        ]),
        ..FloodOverrides::default()
    });
    assert!(flood.is_loaded());
    assert_eq!(flood.config().factor_table[0].min, 0.5);
    let r = flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap();
    assert_eq!(r.factor, 0.5);
    assert_eq!(fetcher.calls(), 1);
}

#[test]
fn configure_new_cell_size_requires_reload() {
    let (mut flood, fetcher) =
        loaded(collection(vec![square(132.45, 34.39, 132.46, 34.40, depth("1m"))]));

    flood.configure(FloodOverrides {
        cell_deg: Some(0.0001),
        ..FloodOverrides::default()
    });
    assert_eq!(flood.config().cell_deg, 0.001);
    assert!(!flood.is_loaded());
    assert!(flood.evaluate(LON, LAT, &EvaluateOptions::default()).is_err());

    assert_eq!(flood.load().unwrap(), 1);
    assert_eq!(fetcher.calls(), 2);
    assert!(flood.evaluate(LON, LAT, &EvaluateOptions::default()).unwrap().in_flood);
}

#[test]
fn second_load_does_not_refetch() {
    let (mut flood, fetcher) =
        loaded(collection(vec![polygon(vec![ring(132.45, 34.39, 132.46, 34.40)], depth("1m"))]));
    assert_eq!(flood.load().unwrap(), 1);
    assert_eq!(fetcher.calls(), 1);
}
