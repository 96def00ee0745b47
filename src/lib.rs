//! Location features for property valuation in Hiroshima prefecture.
//!
//! Each lookup loads one GeoJSON dataset once (`load`), indexes it on a
//! uniform lon/lat grid, and then answers point queries synchronously:
//!
//! - [`ZoningLookup`]: land-use zone and its coverage / floor-area ratios
//! - [`FloodHazardLookup`]: flood inundation depth class and value factor
//! - [`StationProximitySearch`]: nearest rail stations with ridership
//! - [`FeatureEnrichment`]: zoning + stations (+ flood) for one point
//!
//! Coordinates are always `(lon, lat)` in the dataset's datum.

pub mod depth;
pub mod enrich;
pub mod error;
pub mod flood;
pub mod geometry;
pub mod indexer;
pub mod loader;
pub mod stations;
pub mod structures;
pub mod zoning;

pub use enrich::{EnrichOptions, FeatureEnrichment, LoadReport};
pub use error::{LoadError, LookupError};
pub use flood::{EvaluateOptions, FloodConfig, FloodHazardLookup, FloodOverrides};
pub use loader::{DatasetSource, DefaultFetcher, Fetch};
pub use stations::{NearestOptions, StationConfig, StationProximitySearch};
pub use structures::{
    DepthClass, Enrichment, FactorRow, FloodResult, FloodSample, LonLat, Station, StationResult,
    ZoningResult,
};
pub use zoning::{ZoningConfig, ZoningLookup};
