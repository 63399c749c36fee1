//! Error types for kit resolution.
//!
//! Only conditions that abort a transfer or verification surface here.
//! Recoverable resolution outcomes carry their own types instead: an
//! unreachable network or unavailable portal is a [`ProbeResult`], a failed
//! catalog fetch is a [`CatalogError`], and an exhausted fallback search is
//! a candidate without a link. The orchestrator translates all of them into
//! plain-text outcome messages.
//!
//! [`ProbeResult`]: crate::portal::ProbeResult
//! [`CatalogError`]: crate::catalog::CatalogError

use std::io;
use std::path::PathBuf;

/// Result type for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that can occur while transferring or verifying a kit.
///
/// Every variant is recovered inside the orchestrator and translated into a
/// final failure message; none escapes the outer boundary.
#[derive(Debug)]
pub enum ResolveError {
    /// The downloaded disk image failed its integrity check.
    IntegrityCheckFailed { path: PathBuf, detail: String },

    /// The transfer itself failed (timeout, interrupted stream, bad status).
    TransferFailed { url: String, reason: String },

    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    WriteFailed { path: PathBuf, source: io::Error },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IntegrityCheckFailed { path, detail } => {
                write!(
                    f,
                    "integrity check failed for {}: {}",
                    path.display(),
                    detail
                )
            }
            Self::TransferFailed { url, reason } => {
                write!(f, "failed to download {}: {}", url, reason)
            }
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
