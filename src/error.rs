//! Error types for webview-devserver
//!
//! One flat error enum covers the whole crate: fetching, extraction, the
//! asset store, and the local file server. `Display` strings are the
//! human-readable messages surfaced through the bridge layer to the end
//! user, so variants carry enough context to stand on their own.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for webview-devserver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for webview-devserver
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure while talking to the archive source
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The archive source answered with a non-success HTTP status
    #[error("server returned HTTP {status} for {url}")]
    HttpStatus {
        /// Status code returned by the remote server
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Downloaded archive digest does not match the expected checksum
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The checksum supplied by the caller (hex SHA-256)
        expected: String,
        /// The digest actually computed over the downloaded bytes
        actual: String,
    },

    /// Filesystem operation failed
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path the operation was acting on
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The local file server could not bind its listening socket
    #[error("failed to bind local server on {addr}: {source}")]
    Bind {
        /// The address the bind was attempted on
        addr: SocketAddr,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Archive is malformed or contains an entry escaping the target directory
    #[error("extraction failed for {archive}: {reason}")]
    Extraction {
        /// Path of the archive being extracted
        archive: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// No asset with the given name exists in the store
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// A caller-supplied value is missing or unusable
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Attach a path to an `std::io::Error`
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
