use crate::error::LoadError;
use crate::structures::{JsonObject, LonLat, PolygonFeature};
use flate2::read::GzDecoder;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{FeatureCollection, GeoJson};
use reqwest::blocking::Client;
use serde_json::Value;
use std::convert::Infallible;
use std::fmt::{self, Display};
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Where a dataset lives: a local file or an `http(s)://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Path(PathBuf),
    Url(String),
}

impl DatasetSource {
    pub fn is_gzip_name(&self) -> bool {
        match self {
            DatasetSource::Path(p) => p
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("gz")),
            DatasetSource::Url(u) => {
                let path = u.split(['?', '#']).next().unwrap_or(u);
                path.to_ascii_lowercase().ends_with(".gz")
            }
        }
    }
}

impl FromStr for DatasetSource {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(DatasetSource::Url(s.to_owned()))
        } else {
            Ok(DatasetSource::Path(PathBuf::from(s)))
        }
    }
}

impl From<PathBuf> for DatasetSource {
    fn from(path: PathBuf) -> Self {
        DatasetSource::Path(path)
    }
}

impl Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::Path(p) => write!(f, "{}", p.display()),
            DatasetSource::Url(u) => f.write_str(u),
        }
    }
}

/// Retrieves raw dataset bytes.
pub trait Fetch: Send + Sync {
    fn fetch(&self, source: &DatasetSource) -> Result<Vec<u8>, LoadError>;
}

/// Reads local files from disk and URLs with a blocking HTTP GET.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    pub timeout: Duration,
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
        }
    }
}

impl Fetch for DefaultFetcher {
    fn fetch(&self, source: &DatasetSource) -> Result<Vec<u8>, LoadError> {
        match source {
            DatasetSource::Path(path) => std::fs::read(path).map_err(|e| LoadError::Io {
                path: path.clone(),
                source: e,
            }),
            DatasetSource::Url(url) => {
                let client = Client::builder().timeout(self.timeout).build()?;
                let response = client.get(url).send()?;
                if !response.status().is_success() {
                    return Err(LoadError::HttpStatus {
                        url: url.clone(),
                        status: response.status().as_u16(),
                    });
                }
                Ok(response.bytes()?.to_vec())
            }
        }
    }
}

/// Items parsed from a collection, plus the number of features rejected.
#[derive(Debug)]
pub struct Parsed<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

/// Fetch, gunzip if needed, and parse a GeoJSON FeatureCollection.
pub fn read_feature_collection(
    fetcher: &dyn Fetch,
    source: &DatasetSource,
) -> Result<FeatureCollection, LoadError> {
    let raw = fetcher.fetch(source)?;
    let bytes = maybe_gunzip(raw, source)?;
    let text = std::str::from_utf8(&bytes)?;
    let text = text.trim_start_matches('\u{feff}');

    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(LoadError::NotFeatureCollection(source.to_string())),
    }
}

fn maybe_gunzip(raw: Vec<u8>, source: &DatasetSource) -> Result<Vec<u8>, LoadError> {
    if !raw.starts_with(&GZIP_MAGIC) && !source.is_gzip_name() {
        return Ok(raw);
    }
    let mut out = Vec::with_capacity(raw.len() * 4);
    GzDecoder::new(raw.as_slice())
        .read_to_end(&mut out)
        .map_err(|e| LoadError::Decompress {
            location: source.to_string(),
            source: e,
        })?;
    Ok(out)
}

/// Convert Polygon / MultiPolygon features, skipping everything else.
pub fn polygon_features<A>(
    collection: &FeatureCollection,
    attributes: impl Fn(&JsonObject) -> A,
) -> Parsed<PolygonFeature<A>> {
    let empty = JsonObject::new();
    let mut items = Vec::with_capacity(collection.features.len());
    let mut skipped = 0;

    for feature in &collection.features {
        let shape = feature
            .geometry
            .as_ref()
            .and_then(|g| multi_polygon_of(&g.value));
        let props = feature.properties.as_ref().unwrap_or(&empty);

        match shape.and_then(|s| PolygonFeature::new(s, attributes(props))) {
            Some(f) => items.push(f),
            None => skipped += 1,
        }
    }

    Parsed { items, skipped }
}

/// Convert Point features, skipping everything else.
pub fn point_features<T>(
    collection: &FeatureCollection,
    build: impl Fn(LonLat, &JsonObject) -> T,
) -> Parsed<T> {
    let empty = JsonObject::new();
    let mut items = Vec::with_capacity(collection.features.len());
    let mut skipped = 0;

    for feature in &collection.features {
        let point = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(geojson::Value::Point(pos)) => position(pos),
            _ => None,
        };
        let Some(c) = point else {
            skipped += 1;
            continue;
        };
        let props = feature.properties.as_ref().unwrap_or(&empty);
        items.push(build(LonLat::new(c.x, c.y), props));
    }

    Parsed { items, skipped }
}

fn multi_polygon_of(value: &geojson::Value) -> Option<MultiPolygon<f64>> {
    let polygons: Vec<Polygon<f64>> = match value {
        geojson::Value::Polygon(rings) => polygon_of(rings).into_iter().collect(),
        geojson::Value::MultiPolygon(polys) => {
            polys.iter().filter_map(|rings| polygon_of(rings)).collect()
        }
        _ => return None,
    };
    (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
}

fn polygon_of(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let (outer, holes) = rings.split_first()?;
    let exterior = closed_ring(outer)?;
    let interiors = holes.iter().filter_map(|r| closed_ring(r)).collect();
    Some(Polygon::new(exterior, interiors))
}

/// Close the ring if needed; reject rings under 4 vertices or with a
/// malformed position.
fn closed_ring(positions: &[Vec<f64>]) -> Option<LineString<f64>> {
    let mut coords = positions
        .iter()
        .map(|p| position(p))
        .collect::<Option<Vec<Coord<f64>>>>()?;
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
    (coords.len() >= 4).then(|| LineString::new(coords))
}

fn position(pos: &[f64]) -> Option<Coord<f64>> {
    match pos {
        [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

/// First alias carrying a non-blank string (numbers are stringified).
pub fn first_text(props: &JsonObject, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| match props.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First alias carrying a finite number, either as a JSON number or a
/// numeric string.
pub fn first_number(props: &JsonObject, aliases: &[&str]) -> Option<f64> {
    aliases.iter().find_map(|key| {
        let v = match props.get(*key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
            _ => return None,
        };
        v.is_finite().then_some(v)
    })
}
