//! Error types for compositing.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("Malformed time span: start {start} is not before end {end}")]
    MalformedTimeSpan {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Band `{band}` is missing from image `{image}`")]
    MissingBand { band: String, image: String },

    #[error("Image `{image}` is {found_width}x{found_height}, expected {width}x{height}")]
    GridMismatch {
        image: String,
        width: usize,
        height: usize,
        found_width: usize,
        found_height: usize,
    },

    #[error("Band `{band}` has {found} values, expected {expected}")]
    BandLength {
        band: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Malformed scene record: {0}")]
    MalformedRecord(String),

    #[error("Unknown variable family: {0}")]
    UnknownFamily(String),
}

pub type Result<T> = std::result::Result<T, CompositeError>;
