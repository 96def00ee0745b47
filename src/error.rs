use std::path::PathBuf;

/// Failure while fetching or parsing a dataset.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Local file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Gzip payload could not be decompressed.
    #[error("failed to decompress {location}: {source}")]
    Decompress {
        location: String,
        source: std::io::Error,
    },

    #[error("dataset is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Payload is not valid GeoJSON.
    #[error("GeoJSON parse error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Payload is GeoJSON but not a FeatureCollection.
    #[error("expected a GeoJSON FeatureCollection in {0}")]
    NotFeatureCollection(String),
}

/// Failure of a lookup call.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// A query was issued before `load()` completed.
    #[error("{component} queried before load(); call load() first")]
    NotLoaded {
        /// Component that was queried.
        component: &'static str,
    },

    #[error(transparent)]
    Load(#[from] LoadError),
}
