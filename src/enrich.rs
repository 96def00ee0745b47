use crate::error::{LoadError, LookupError};
use crate::flood::{EvaluateOptions, FloodHazardLookup};
use crate::stations::{NearestOptions, StationProximitySearch};
use crate::structures::{Enrichment, LonLat};
use crate::zoning::ZoningLookup;
use tracing::{info, warn};

const COMPONENT: &str = "FeatureEnrichment";

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub stations: NearestOptions,
    pub flood: EvaluateOptions,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            stations: NearestOptions {
                k: 3,
                ..NearestOptions::default()
            },
            flood: EvaluateOptions::default(),
        }
    }
}

/// Which sources made it through `load()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub stations: usize,
    pub zoning: Option<usize>,
    pub flood: Option<usize>,
}

/// Zoning, nearest stations and (optionally) flood exposure for one point.
///
/// Station data is required; zoning and flood data are optional and a
/// failure to load either only blanks that section of every result.
pub struct FeatureEnrichment {
    zoning: ZoningLookup,
    stations: StationProximitySearch,
    flood: Option<FloodHazardLookup>,
    report: Option<LoadReport>,
}

impl FeatureEnrichment {
    pub fn new(zoning: ZoningLookup, stations: StationProximitySearch) -> Self {
        Self {
            zoning,
            stations,
            flood: None,
            report: None,
        }
    }

    pub fn with_flood(mut self, flood: FloodHazardLookup) -> Self {
        self.flood = Some(flood);
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.report.is_some()
    }

    pub fn zoning(&self) -> &ZoningLookup {
        &self.zoning
    }

    pub fn stations(&self) -> &StationProximitySearch {
        &self.stations
    }

    pub fn flood(&self) -> Option<&FloodHazardLookup> {
        self.flood.as_ref()
    }

    /// Load every source. Fails only when the station dataset fails.
    pub fn load(&mut self) -> Result<LoadReport, LoadError> {
        if let Some(report) = self.report {
            return Ok(report);
        }

        let zoning = match self.zoning.load() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, source = %self.zoning.config().source, "zoning unavailable; results will carry no zoning");
                None
            }
        };

        let flood = match self.flood.as_mut().map(|f| f.load()) {
            None => None,
            Some(Ok(n)) => Some(n),
            Some(Err(e)) => {
                warn!(error = %e, "flood data unavailable; results will carry no flood section");
                None
            }
        };

        let stations = self.stations.load()?;

        let report = LoadReport {
            stations,
            zoning,
            flood,
        };
        info!(?report, "enrichment sources ready");
        self.report = Some(report);
        Ok(report)
    }

    pub fn enrich(
        &self,
        lon: f64,
        lat: f64,
        opts: &EnrichOptions,
    ) -> Result<Enrichment, LookupError> {
        if self.report.is_none() {
            return Err(LookupError::NotLoaded { component: COMPONENT });
        }

        let zoning = if self.zoning.is_loaded() {
            self.zoning.query(lon, lat)?
        } else {
            None
        };
        let stations = self.stations.nearest(lon, lat, &opts.stations)?;
        let flood = match &self.flood {
            Some(f) if f.is_loaded() => Some(f.evaluate(lon, lat, &opts.flood)?),
            _ => None,
        };

        Ok(Enrichment {
            input: LonLat::new(lon, lat),
            zoning,
            stations,
            flood,
        })
    }
}
