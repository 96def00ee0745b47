use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use valuation_features::Enrichment;

/// One output CSV row per enriched point.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedRow {
    pub id: String,
    pub lon: f64,
    pub lat: f64,
    pub zone_name: Option<String>,
    pub building_coverage_ratio: Option<f64>,
    pub floor_area_ratio: Option<f64>,
    pub station_count: usize,
    pub nearest_station: Option<String>,
    pub nearest_line: Option<String>,
    pub nearest_operator: Option<String>,
    pub nearest_distance_m: Option<f64>,
    pub nearest_ridership: Option<f64>,
    pub in_flood: Option<bool>,
    pub flood_depth_class: Option<String>,
    pub flood_factor: Option<f64>,
}

impl EnrichedRow {
    pub fn new(id: String, enrichment: &Enrichment) -> Self {
        let zoning = enrichment.zoning.as_ref();
        let nearest = enrichment.stations.first();
        let flood = enrichment.flood.as_ref();

        Self {
            id,
            lon: enrichment.input.lon,
            lat: enrichment.input.lat,
            zone_name: zoning.map(|z| z.name.clone()),
            building_coverage_ratio: zoning.and_then(|z| z.building_coverage_ratio),
            floor_area_ratio: zoning.and_then(|z| z.floor_area_ratio),
            station_count: enrichment.stations.len(),
            nearest_station: nearest.map(|s| s.name.clone()),
            nearest_line: nearest.map(|s| s.line.clone()),
            nearest_operator: nearest.map(|s| s.operator.clone()),
            nearest_distance_m: nearest.map(|s| s.distance_meters.round()),
            nearest_ridership: nearest.and_then(|s| s.ridership),
            in_flood: flood.map(|f| f.in_flood),
            flood_depth_class: flood.and_then(|f| f.depth_class.clone()),
            flood_factor: flood.map(|f| f.factor),
        }
    }
}

pub struct EnrichmentWriter {
    writer: csv::Writer<File>,
    batch_buffer: Vec<EnrichedRow>,
    batch_size: usize,
    written: usize,
}

impl EnrichmentWriter {
    pub fn new(path: &Path, batch_size: usize) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create output file: {:?}", path))?;
        let batch_size = batch_size.max(1);

        Ok(Self {
            writer,
            batch_buffer: Vec::with_capacity(batch_size),
            batch_size,
            written: 0,
        })
    }

    pub fn write(&mut self, row: EnrichedRow) -> Result<()> {
        self.batch_buffer.push(row);
        if self.batch_buffer.len() >= self.batch_size {
            self.flush_buffer()?;
        }
        Ok(())
    }

    pub fn flush_buffer(&mut self) -> Result<()> {
        if self.batch_buffer.is_empty() {
            return Ok(());
        }

        for row in self.batch_buffer.drain(..) {
            self.writer.serialize(&row).context("Failed to serialize row")?;
            self.written += 1;
        }
        self.writer.flush()?;

        Ok(())
    }

    /// Flush remaining rows; returns the number of rows written.
    pub fn close(mut self) -> Result<usize> {
        self.flush_buffer()?;
        self.writer.flush()?;
        Ok(self.written)
    }
}
