#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use valuation_features::{DatasetSource, Fetch, LoadError};

/// Serves GeoJSON payloads from memory and counts every fetch.
#[derive(Default)]
pub struct MemoryFetcher {
    payloads: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, collection: Value) -> Self {
        self.payloads
            .insert(name.to_owned(), collection.to_string().into_bytes());
        self
    }

    pub fn with_raw(mut self, name: &str, bytes: &[u8]) -> Self {
        self.payloads.insert(name.to_owned(), bytes.to_vec());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, source: &DatasetSource) -> Result<Vec<u8>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .get(&source.to_string())
            .cloned()
            .ok_or_else(|| LoadError::HttpStatus {
                url: source.to_string(),
                status: 404,
            })
    }
}

pub fn source(name: &str) -> DatasetSource {
    DatasetSource::Url(name.to_owned())
}

/// Closed square ring from (x0, y0) to (x1, y1).
pub fn ring(x0: f64, y0: f64, x1: f64, y1: f64) -> Value {
    json!([[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]])
}

pub fn polygon(rings: Vec<Value>, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {"type": "Polygon", "coordinates": rings}
    })
}

pub fn square(x0: f64, y0: f64, x1: f64, y1: f64, properties: Value) -> Value {
    polygon(vec![ring(x0, y0, x1, y1)], properties)
}

pub fn point(lon: f64, lat: f64, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {"type": "Point", "coordinates": [lon, lat]}
    })
}

pub fn collection(features: Vec<Value>) -> Value {
    json!({"type": "FeatureCollection", "features": features})
}

pub fn station(lon: f64, lat: f64, name: &str, line: &str, operator: &str) -> Value {
    point(
        lon,
        lat,
        json!({"N02_005": name, "N02_003": line, "N02_004": operator}),
    )
}

/// Stations around central Hiroshima.
pub fn hiroshima_stations() -> Value {
    collection(vec![
        point(
            132.4575,
            34.3946,
            json!({"N02_005": "紙屋町東", "N02_003": "本線", "N02_004": "広島電鉄", "ridership_2022": 12000}),
        ),
        point(
            132.4589,
            34.3925,
            json!({"S12_name": "本通", "S12_line": "広島新交通1号線", "S12_operator": "広島高速交通", "ridership_2022": "8,400"}),
        ),
        station(132.4756, 34.3978, "広島", "山陽線", "西日本旅客鉄道"),
        station(132.4632, 34.3927, "八丁堀", "本線", "広島電鉄"),
        station(132.4419, 34.3950, "横川", "山陽線", "西日本旅客鉄道"),
        station(132.4844, 34.3813, "比治山下", "皆実線", "広島電鉄"),
        station(132.5016, 34.4103, "矢賀", "芸備線", "西日本旅客鉄道"),
    ])
}
