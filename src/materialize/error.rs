//! Error types for local materialization.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing a document to local disk.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// File system error (create directory, stat, delete, write).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the remote byte stream failed mid-copy.
    #[error("stream error while writing {path}: {source}")]
    Stream {
        /// Destination file (already removed).
        path: PathBuf,
        /// The underlying read error.
        #[source]
        source: std::io::Error,
    },

    /// A remote folder segment would escape or alias the local root.
    #[error("refusing folder segment '{segment}' in remote path '{folder_path}'")]
    InvalidSegment {
        /// Offending segment.
        segment: String,
        /// Full remote folder path.
        folder_path: String,
    },

    /// The document has no usable filename.
    #[error("document filename '{filename}' is empty or not a plain file name")]
    InvalidFilename {
        /// Filename as reported by the vault.
        filename: String,
    },

    /// Even the shortest allowed form of the path reaches the limit.
    #[error("path too long even after shortening ({length} >= {limit} characters): {path}")]
    PathTooLong {
        /// Shortest candidate that was tried.
        path: PathBuf,
        /// Its length in characters.
        length: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl MaterializeError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a stream error.
    pub fn stream(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Stream {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = MaterializeError::io("/tmp/mirror/license.pdf", io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/mirror/license.pdf"), "Expected path in: {msg}");
        assert!(msg.contains("access denied"), "Expected cause in: {msg}");
    }

    #[test]
    fn test_materialize_error_path_too_long_display() {
        let error = MaterializeError::PathTooLong {
            path: PathBuf::from("/very/long"),
            length: 240,
            limit: 200,
        };
        let msg = error.to_string();
        assert!(msg.contains("240 >= 200"), "Expected lengths in: {msg}");
    }
}
