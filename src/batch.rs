use crate::cli::BatchArgs;
use crate::commands::{build_enrichment, nearest_options};
use crate::writer::{EnrichedRow, EnrichmentWriter};
use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use valuation_features::{EnrichOptions, Enrichment, LookupError};

#[derive(Debug, Clone, Deserialize)]
struct PointRow {
    id: String,
    lon: f64,
    lat: f64,
}

#[derive(Debug, Serialize)]
struct BatchSummary {
    generated_at: String,
    input: PathBuf,
    output: PathBuf,
    points: usize,
    rejected_rows: usize,
    zoned: usize,
    with_station: usize,
    in_flood: usize,
    flood_evaluated: bool,
    mean_nearest_station_m: Option<f64>,
    elapsed_ms: u128,
}

fn log_coordinate_sanity(points: &[PointRow]) {
    if points.is_empty() {
        return;
    }
    // Heuristic: in Japan longitude (~122..154) is always larger than
    // latitude (~20..46); the reverse suggests swapped columns.
    let swapped = points
        .iter()
        .filter(|p| p.lon.is_finite() && p.lat.is_finite() && p.lat > p.lon)
        .count();
    if swapped * 2 > points.len() {
        warn!(
            swapped,
            points = points.len(),
            "coordinate sanity: most rows have lat > lon; expected columns id,lon,lat"
        );
    }
}

fn read_points(path: &Path) -> Result<(Vec<PointRow>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open points file: {:?}", path))?;

    let mut points = Vec::new();
    let mut rejected = 0;
    for (i, row) in reader.deserialize::<PointRow>().enumerate() {
        match row {
            Ok(p) => points.push(p),
            Err(e) => {
                rejected += 1;
                warn!(row = i + 1, error = %e, "skipping unreadable point row");
            }
        }
    }
    Ok((points, rejected))
}

fn summary_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".summary.json");
    PathBuf::from(name)
}

pub fn run_batch(args: BatchArgs) -> Result<()> {
    info!("starting batch mode");
    info!(input=?args.input, "input points");
    info!(output=?args.output, "output");

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let start = Instant::now();
    let (points, rejected_rows) = read_points(&args.input)?;
    let mut enrichment = build_enrichment(&args.sources);
    let report = enrichment.load().context("Failed to load station dataset")?;

    info!(
        points = points.len(),
        stations = report.stations,
        zoning = ?report.zoning,
        flood = ?report.flood,
        elapsed_ms = start.elapsed().as_millis(),
        "loaded inputs"
    );
    log_coordinate_sanity(&points);

    let opts = EnrichOptions {
        stations: nearest_options(args.k, &args.filters),
        ..EnrichOptions::default()
    };

    let start_enrich = Instant::now();
    let results: Vec<Enrichment> = points
        .par_iter()
        .map(|p| enrichment.enrich(p.lon, p.lat, &opts))
        .collect::<Result<Vec<_>, LookupError>>()?;
    info!(
        elapsed_ms = start_enrich.elapsed().as_millis(),
        points = results.len(),
        "enrichment completed"
    );

    let zoned = results.iter().filter(|r| r.zoning.is_some()).count();
    let in_flood = results
        .iter()
        .filter(|r| r.flood.as_ref().is_some_and(|f| f.in_flood))
        .count();
    let nearest: Vec<f64> = results
        .iter()
        .filter_map(|r| r.stations.first().map(|s| s.distance_meters))
        .collect();
    let mean_nearest_station_m =
        (!nearest.is_empty()).then(|| nearest.iter().sum::<f64>() / nearest.len() as f64);
    info!(zoned, in_flood, with_station = nearest.len(), "batch stats");

    let start_write = Instant::now();
    let mut writer = EnrichmentWriter::new(&args.output, args.batch_size)?;
    for (p, r) in points.iter().zip(&results) {
        writer.write(EnrichedRow::new(p.id.clone(), r))?;
    }
    let written = writer.close()?;
    info!(
        rows = written,
        elapsed_ms = start_write.elapsed().as_millis(),
        "writing completed"
    );

    let summary = BatchSummary {
        generated_at: Utc::now().to_rfc3339(),
        input: args.input.clone(),
        output: args.output.clone(),
        points: results.len(),
        rejected_rows,
        zoned,
        with_station: nearest.len(),
        in_flood,
        flood_evaluated: report.flood.is_some(),
        mean_nearest_station_m,
        elapsed_ms: start.elapsed().as_millis(),
    };
    let path = summary_path(&args.output);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create summary file: {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &summary)
        .context("Failed to write summary file")?;
    info!(summary = ?path, "summary written");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_sits_next_to_output() {
        assert_eq!(
            summary_path(Path::new("out/points.csv")),
            PathBuf::from("out/points.csv.summary.json")
        );
    }

    #[test]
    fn reads_points_and_counts_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        std::fs::write(&path, "id,lon,lat\na, 132.455 ,34.395\nb,oops,34.4\nc,132.47,34.41\n").unwrap();
        let (points, rejected) = read_points(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(rejected, 1);
        assert_eq!(points[1].id, "c");
    }
}
