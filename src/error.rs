use std::path::PathBuf;
use thiserror::Error;

/// Failure to build a map's region set from its vector source.
///
/// Fatal to the affected map only; the atlas keeps going without it.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path:?} must be a GeoJSON FeatureCollection")]
    NotFeatureCollection { path: PathBuf },

    #[error("unsupported geometry format {extension:?} for {path:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("feature {feature} in {path:?} has no usable name field {field:?}")]
    MissingNameField {
        path: PathBuf,
        field: String,
        feature: usize,
    },

    #[error("feature {feature} in {path:?} has invalid geometry: {message}")]
    Geometry {
        path: PathBuf,
        feature: usize,
        message: String,
    },

    #[error("{path:?} contains no polygon regions")]
    Empty { path: PathBuf },
}
