//! Error types for MineWatch

use thiserror::Error;

/// Main error type for MineWatch operations
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

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    /// Structural problem with a multi-band input raster (wrong band count, missing band).
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A geometric operation failed or produced a degenerate result.
    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for MineWatch operations
pub type Result<T> = std::result::Result<T, Error>;
