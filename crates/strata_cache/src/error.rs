//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Only configuration-fatal conditions (an unusable cache root, a failed
/// generation rotation) and write-side encoding failures surface as errors.
/// Read-side problems never do: a corrupted or unreadable entry is reported
/// as a cache miss so that correctness degrades to recomputation.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A cache entry could not be encoded for storage.
    #[error("failed to encode cache entry: {reason}")]
    Serialization {
        /// Description of the encoding failure.
        reason: String,
    },
}
