use thiserror::Error;

/// Errors raised by the tile engine.
///
/// A tile that is simply not present is never an error: stores return the
/// null tile for it (see [`Tile::is_null`](crate::tile::Tile::is_null)).
#[derive(Debug, Error)]
pub enum TileError {
    /// File or database open, read or write failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Persisted range or table is missing or has an unexpected layout
    #[error("Schema error: {0}")]
    Schema(String),

    /// Serialized tile stream is too short or malformed
    #[error("Corrupt tile data: {0}")]
    CorruptData(String),

    /// Range bounds, step and size do not agree
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// A raster buffer could not be reserved
    #[error("Allocation failed: could not reserve {requested} samples")]
    Allocation { requested: usize },

    /// Caller-provided output buffer has the wrong length
    #[error("Buffer size mismatch: expected {expected} samples, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for TileError {
    fn from(err: rusqlite::Error) -> Self {
        TileError::Io(err.to_string())
    }
}

impl From<std::io::Error> for TileError {
    fn from(err: std::io::Error) -> Self {
        TileError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TileError {
    fn from(err: serde_json::Error) -> Self {
        TileError::Serialization(err.to_string())
    }
}
