//! Error types for directory windowing
//!
//! Resolution and windowing failures are returned synchronously to the caller.
//! Filesystem failures hit inside the balancer worker are logged and retried
//! instead of being surfaced, see [`crate::balancer`].

use std::path::PathBuf;

use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Result type for dirscroll operations
pub type DirScrollResult<T> = Result<T, DirScrollError>;

/// Errors that can occur while resolving identifiers, building snapshots or
/// selecting windows.
#[derive(Error, Debug)]
pub enum DirScrollError {
    /// The identifier is well-formed but nothing exists at its path
    #[error("not found: {identifier}")]
    NotFound {
        /// Identifier that failed to resolve
        identifier: String,
    },

    /// The identifier could not be parsed against the active resolver
    #[error("malformed identifier {identifier:?}: {reason}")]
    MalformedIdentifier {
        /// Offending identifier
        identifier: String,
        /// Short parse failure description
        reason: &'static str,
    },

    /// Listing or stat failure from the filesystem collaborator
    #[error("io error at {}: {source}", path.display())]
    Io {
        /// Path the failing operation was applied to
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// An index fell outside the snapshot it was applied to
    #[error("index {index} out of range for snapshot of {len} entries")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Snapshot length at the time of the request
        len: usize,
    },
}

impl DirScrollError {
    /// Create a not-found error
    pub fn not_found(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        #[cfg(feature = "tracing")]
        debug!(%identifier, "identifier did not resolve");
        Self::NotFound { identifier }
    }

    /// Create a malformed-identifier error
    pub fn malformed(identifier: impl Into<String>, reason: &'static str) -> Self {
        let identifier = identifier.into();
        #[cfg(feature = "tracing")]
        debug!(%identifier, reason, "malformed identifier");
        Self::MalformedIdentifier { identifier, reason }
    }

    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        #[cfg(feature = "tracing")]
        warn!(path = %path.display(), error = %source, "filesystem operation failed");
        Self::Io { path, source }
    }

    /// Create an out-of-range error
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        #[cfg(feature = "tracing")]
        debug!(index, len, "index out of range");
        Self::IndexOutOfRange { index, len }
    }

    /// Returns `true` for filesystem failures, which callers may retry.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
