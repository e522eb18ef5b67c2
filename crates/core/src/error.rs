//! Error types for sarflood

use thiserror::Error;

/// Main error type for sarflood operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// A raster input violates a structural precondition (e.g. band count).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No scene matched a query or filter.
    #[error("No imagery for {what}")]
    NoImagery { what: String },

    /// Threshold selection found no valid pixel inside the region.
    #[error("Empty histogram: no valid pixels of band '{band}' inside region '{region}'")]
    EmptyHistogram { band: String, region: String },

    /// A layer is not on the same grid as the primary raster, or its CRS
    /// cannot be converted to the primary raster's CRS.
    #[error("Shape mismatch for '{layer}': {reason}")]
    ShapeMismatch { layer: String, reason: String },

    /// A batch was requested past the end of the point set.
    #[error("Batch start index {start} out of range for {len} points")]
    BatchIndex { start: usize, len: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Pixel budget exceeded: {pixels} pixels at scale {scale} (limit {limit})")]
    TooManyPixels {
        pixels: usize,
        scale: f64,
        limit: usize,
    },

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error in {source_name} line {line}: {reason}")]
    Parse {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error only abandons the current unit of work.
    ///
    /// A missing acquisition on one date is expected during a monitoring
    /// window; the run reports it and carries on with the remaining dates.
    /// Everything else points at configuration or data-alignment defects.
    pub fn aborts_unit_only(&self) -> bool {
        matches!(self, Error::NoImagery { .. })
    }

    /// Shorthand for an [`Error::InvalidParameter`].
    pub fn invalid_param(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for sarflood operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_imagery_is_skippable() {
        let missing = Error::NoImagery { what: "2024-07-01 ASCENDING".into() };
        assert!(missing.aborts_unit_only());

        let empty = Error::EmptyHistogram { band: "VH".into(), region: "aoi".into() };
        assert!(!empty.aborts_unit_only());

        let batch = Error::BatchIndex { start: 3000, len: 2500 };
        assert!(!batch.aborts_unit_only());
        assert_eq!(
            batch.to_string(),
            "Batch start index 3000 out of range for 2500 points"
        );
    }

    #[test]
    fn test_display_names_the_failure() {
        let mismatch = Error::ShapeMismatch {
            layer: "region 'aoi'".into(),
            reason: "no transform from EPSG:4326 to EPSG:3857".into(),
        };
        assert_eq!(
            mismatch.to_string(),
            "Shape mismatch for 'region 'aoi'': no transform from EPSG:4326 to EPSG:3857"
        );
        assert_eq!(Error::Other("boom".into()).to_string(), "boom");
    }
}
