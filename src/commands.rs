use crate::cli::{
    EnrichArgs, FindStationArgs, FloodArgs, SourceArgs, StationFilterArgs, StationsArgs,
    ZoningArgs,
};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;
use valuation_features::{
    EnrichOptions, Enrichment, EvaluateOptions, FactorRow, FeatureEnrichment, FloodConfig,
    FloodHazardLookup, FloodOverrides, FloodResult, NearestOptions, StationConfig,
    StationProximitySearch, StationResult, ZoningConfig, ZoningLookup, ZoningResult,
};

pub fn run_zoning(args: ZoningArgs) -> Result<()> {
    let mut lookup = ZoningLookup::new(ZoningConfig {
        source: args.data,
        cell_deg: args.cell_deg,
        respect_holes: args.respect_holes,
    });
    lookup
        .load()
        .with_context(|| format!("Failed to load zoning dataset {}", lookup.config().source))?;

    let result = lookup.query(args.point.lon, args.point.lat)?;
    if args.point.human {
        print_zoning(result.as_ref());
        Ok(())
    } else {
        print_json(&result)
    }
}

pub fn run_flood(args: FloodArgs) -> Result<()> {
    let mut lookup = FloodHazardLookup::new(FloodConfig {
        source: args.data,
        cell_deg: args.cell_deg,
        ..FloodConfig::default()
    });
    if let Some(path) = &args.factor_table {
        let table = read_factor_table(path)?;
        info!(rows = table.len(), path = ?path, "using custom factor table");
        lookup.configure(FloodOverrides {
            factor_table: Some(table),
            ..FloodOverrides::default()
        });
    }
    lookup
        .load()
        .with_context(|| format!("Failed to load flood dataset {}", lookup.config().source))?;

    let opts = EvaluateOptions {
        search_radius_cells: args.search_radius,
        limit: args.limit,
        ..EvaluateOptions::default()
    };
    let result = lookup.evaluate(args.point.lon, args.point.lat, &opts)?;
    if args.point.human {
        print_flood(&result);
        Ok(())
    } else {
        print_json(&result)
    }
}

pub fn run_stations(args: StationsArgs) -> Result<()> {
    let mut search = StationProximitySearch::new(StationConfig {
        source: args.data,
        ..StationConfig::default()
    });
    search
        .load()
        .with_context(|| format!("Failed to load station dataset {}", search.config().source))?;

    let mut opts = nearest_options(args.k, &args.filters);
    if args.exhaustive {
        opts = opts.exhaustive();
    }
    let result = search.nearest(args.point.lon, args.point.lat, &opts)?;
    if args.point.human {
        print_stations(&result);
        Ok(())
    } else {
        print_json(&result)
    }
}

pub fn run_find_station(args: FindStationArgs) -> Result<()> {
    let mut search = StationProximitySearch::new(StationConfig {
        source: args.data,
        ..StationConfig::default()
    });
    search
        .load()
        .with_context(|| format!("Failed to load station dataset {}", search.config().source))?;

    for s in search.search_by_name(&args.name, args.limit)? {
        println!(
            "{}\t{}\t{}\t{:.6},{:.6}",
            s.name.bold(),
            s.line_name,
            s.operator_name,
            s.coordinate.lon,
            s.coordinate.lat
        );
    }
    Ok(())
}

pub fn run_enrich(args: EnrichArgs) -> Result<()> {
    let mut enrichment = build_enrichment(&args.sources);
    enrichment.load().context("Failed to load station dataset")?;

    let opts = EnrichOptions {
        stations: nearest_options(args.k, &args.filters),
        ..EnrichOptions::default()
    };
    let result = enrichment.enrich(args.point.lon, args.point.lat, &opts)?;
    if args.point.human {
        print_enrichment(&result);
        Ok(())
    } else {
        print_json(&result)
    }
}

pub fn build_enrichment(sources: &SourceArgs) -> FeatureEnrichment {
    let zoning = ZoningLookup::new(ZoningConfig {
        source: sources.zoning.clone(),
        ..ZoningConfig::default()
    });
    let stations = StationProximitySearch::new(StationConfig {
        source: sources.stations.clone(),
        ..StationConfig::default()
    });
    let enrichment = FeatureEnrichment::new(zoning, stations);
    match &sources.flood {
        Some(source) => enrichment.with_flood(FloodHazardLookup::new(FloodConfig {
            source: source.clone(),
            ..FloodConfig::default()
        })),
        None => enrichment,
    }
}

pub fn nearest_options(k: usize, filters: &StationFilterArgs) -> NearestOptions {
    NearestOptions {
        k,
        max_meters: filters.max_meters,
        operator_like: filters.operator.clone(),
        line_like: filters.line.clone(),
        ..NearestOptions::default()
    }
}

fn read_factor_table(path: &Path) -> Result<Vec<FactorRow>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open factor table: {:?}", path))?;
    let table: Vec<FactorRow> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse factor table: {:?}", path))?;
    if table.is_empty() {
        anyhow::bail!("factor table {:?} has no rows", path);
    }
    Ok(table)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ratio(v: Option<f64>) -> String {
    v.map_or_else(|| "unknown".to_owned(), |r| format!("{r}%"))
}

fn print_zoning(result: Option<&ZoningResult>) {
    match result {
        Some(z) => println!(
            "{} {}  coverage {}  floor-area {}",
            "zone:".dimmed(),
            z.name.bold().green(),
            ratio(z.building_coverage_ratio),
            ratio(z.floor_area_ratio)
        ),
        None => println!("{}", "no zoning polygon at this point".yellow()),
    }
}

fn print_flood(result: &FloodResult) {
    if result.in_flood {
        println!(
            "{} depth {}  factor {:.2}  ({} matching areas)",
            "IN FLOOD AREA".red().bold(),
            result.depth_class.as_deref().unwrap_or("unknown"),
            result.factor,
            result.match_count
        );
        for s in &result.sample {
            println!("  {} {}", s.river_name, s.water_depth.dimmed());
        }
    } else {
        println!("{} ({})", "not in a flood area".green(), result.reasons.join("; "));
    }
}

fn print_stations(stations: &[StationResult]) {
    if stations.is_empty() {
        println!("{}", "no station in range".yellow());
        return;
    }
    for (i, s) in stations.iter().enumerate() {
        let ridership = s
            .ridership
            .map_or_else(String::new, |r| format!("  ridership {r:.0}"));
        println!(
            "{}. {} ({} / {})  {:.0} m{}",
            i + 1,
            s.name.bold(),
            s.line,
            s.operator,
            s.distance_meters,
            ridership.dimmed()
        );
    }
}

fn print_enrichment(result: &Enrichment) {
    println!(
        "{} {:.6}, {:.6}",
        "point".cyan().bold(),
        result.input.lon,
        result.input.lat
    );
    print_zoning(result.zoning.as_ref());
    print_stations(&result.stations);
    if let Some(flood) = &result.flood {
        print_flood(flood);
    }
}
