use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use valuation_features::DatasetSource;

#[derive(Parser)]
#[command(name = "valuation-features")]
#[command(about = "Zoning, flood hazard and nearest-station lookups for property valuation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Land-use zone containing a point
    Zoning(ZoningArgs),
    /// Flood inundation class and value factor at a point
    Flood(FloodArgs),
    /// Nearest rail stations to a point
    Stations(StationsArgs),
    /// Stations whose name contains a string
    FindStation(FindStationArgs),
    /// Zoning, stations and flood data for one point
    Enrich(EnrichArgs),
    /// Enrich every point of a CSV file (columns: id, lon, lat)
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
pub struct PointArgs {
    /// Longitude (east positive)
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude (north positive)
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Print a short colored summary instead of JSON
    #[arg(long, default_value_t = false)]
    pub human: bool,
}

#[derive(Args, Debug)]
pub struct ZoningArgs {
    /// Zoning GeoJSON (path or http(s) URL, optionally .gz)
    #[arg(long)]
    pub data: DatasetSource,

    #[arg(long, default_value_t = 0.01)]
    pub cell_deg: f64,

    /// Treat polygon holes as outside the zone
    #[arg(long, default_value_t = false)]
    pub respect_holes: bool,

    #[command(flatten)]
    pub point: PointArgs,
}

#[derive(Args, Debug)]
pub struct FloodArgs {
    /// Flood extent GeoJSON (path or http(s) URL, optionally .gz)
    #[arg(long)]
    pub data: DatasetSource,

    #[arg(long, default_value_t = 0.02)]
    pub cell_deg: f64,

    /// JSON file with rows of {"min", "label", "factor"} replacing the default table
    #[arg(long)]
    pub factor_table: Option<PathBuf>,

    #[arg(long, default_value_t = 2)]
    pub search_radius: u32,

    #[arg(long, default_value_t = 200)]
    pub limit: usize,

    #[command(flatten)]
    pub point: PointArgs,
}

#[derive(Args, Debug)]
pub struct StationFilterArgs {
    #[arg(long, default_value_t = 20000.0)]
    pub max_meters: f64,

    /// Operator name substring (case-insensitive)
    #[arg(long)]
    pub operator: Option<String>,

    /// Line name substring (case-insensitive)
    #[arg(long)]
    pub line: Option<String>,
}

#[derive(Args, Debug)]
pub struct StationsArgs {
    /// Station point GeoJSON (path or http(s) URL, optionally .gz)
    #[arg(long)]
    pub data: DatasetSource,

    #[arg(long, default_value_t = 5)]
    pub k: usize,

    #[command(flatten)]
    pub filters: StationFilterArgs,

    /// Search every ring up to the cap instead of stopping early
    #[arg(long, default_value_t = false)]
    pub exhaustive: bool,

    #[command(flatten)]
    pub point: PointArgs,
}

#[derive(Args, Debug)]
pub struct FindStationArgs {
    #[arg(long)]
    pub data: DatasetSource,

    #[arg(long)]
    pub name: String,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Zoning GeoJSON; a load failure only drops zoning from results
    #[arg(long)]
    pub zoning: DatasetSource,

    /// Station GeoJSON; required
    #[arg(long)]
    pub stations: DatasetSource,

    /// Flood extent GeoJSON; optional, a load failure only drops flood data
    #[arg(long)]
    pub flood: Option<DatasetSource>,
}

#[derive(Args, Debug)]
pub struct EnrichArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    #[arg(long, default_value_t = 3)]
    pub k: usize,

    #[command(flatten)]
    pub filters: StationFilterArgs,

    #[command(flatten)]
    pub point: PointArgs,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// CSV of points with header id,lon,lat
    #[arg(long)]
    pub input: PathBuf,

    /// Output CSV path; a <output>.summary.json is written next to it
    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 3)]
    pub k: usize,

    #[command(flatten)]
    pub filters: StationFilterArgs,

    #[arg(long, default_value_t = 10000)]
    pub batch_size: usize,
}
