//! Error types for the icnscarve-core library.
//!
//! Two layers are kept apart here. [`ChunkError`] describes malformed data found
//! while reading a chunk; it ends a pass cleanly and is reported, not raised.
//! [`Error`] covers failures of the whole operation (unusable input, output that
//! cannot be persisted) and is always propagated to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for icnscarve operations
pub type Result<T> = std::result::Result<T, Error>;

/// Format anomaly found while decoding a chunk header.
///
/// Every variant is terminal for the current pass.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkError {
    /// Fewer than four bytes follow the marker
    #[error("incomplete chunk header at offset {offset}: only {remaining} byte(s) left")]
    IncompleteHeader {
        /// Offset just past the marker
        offset: usize,
        /// Bytes left in the buffer from `offset`
        remaining: usize,
    },

    /// Declared size cannot even hold the length field itself
    #[error("chunk at offset {offset} declares size {size}, smaller than its own length field")]
    UndersizedChunk {
        /// Offset of the length field
        offset: usize,
        /// Declared chunk size
        size: u32,
    },

    /// Declared size runs past the end of the buffer
    #[error("chunk at offset {offset} declares size {size} but only {available} byte(s) remain")]
    OversizedChunk {
        /// Offset of the length field
        offset: usize,
        /// Declared chunk size
        size: u32,
        /// Bytes left in the buffer from `offset`
        available: usize,
    },
}

impl ChunkError {
    /// Offset at which the malformed chunk was found
    pub fn offset(&self) -> usize {
        match *self {
            Self::IncompleteHeader { offset, .. }
            | Self::UndersizedChunk { offset, .. }
            | Self::OversizedChunk { offset, .. } => offset,
        }
    }
}

/// Comprehensive error type for all icnscarve operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input file is missing, unreadable or too small to scan
    #[error("source '{path}' is unavailable: {reason}")]
    SourceUnavailable {
        /// Path to the input file
        path: PathBuf,
        /// Human-readable cause
        reason: String,
    },

    /// Failed to write an output artifact
    #[error("failed to write artifact '{path}': {source}")]
    ArtifactWrite {
        /// Path to the artifact that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Artifact already exists and overwriting was not requested
    #[error("artifact '{path}' already exists")]
    ArtifactExists {
        /// Path of the existing artifact
        path: PathBuf,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Marker is not exactly four bytes long
    #[error("marker must be exactly 4 bytes, got {len}")]
    InvalidMarker {
        /// Length of the rejected marker
        len: usize,
    },

    /// Pass halted on malformed data and the caller asked for a complete pass
    #[error("pass halted on malformed data: {0}")]
    Malformed(#[from] ChunkError),
}

impl Error {
    /// Creates a new source unavailable error
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new artifact write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ArtifactWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new artifact exists error
    pub fn artifact_exists(path: impl Into<PathBuf>) -> Self {
        Self::ArtifactExists { path: path.into() }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the error comes from the data itself rather than the environment
    pub fn is_format_anomaly(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::source_unavailable("/tmp/missing.dat", "file does not exist");
        assert!(err.to_string().contains("/tmp/missing.dat"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_chunk_error_offset() {
        let err = ChunkError::OversizedChunk {
            offset: 12,
            size: u32::MAX,
            available: 4,
        };
        assert_eq!(err.offset(), 12);
        assert!(err.to_string().contains("4294967295"));
    }

    #[test]
    fn test_is_format_anomaly() {
        let malformed: Error = ChunkError::IncompleteHeader {
            offset: 4,
            remaining: 2,
        }
        .into();
        assert!(malformed.is_format_anomaly());
        assert!(!Error::artifact_exists("/tmp/icon_0000.icns").is_format_anomaly());
    }
}
