//! Integrity verification of downloaded disk images.

use std::path::Path;
use std::process::Command;

use tracing::warn;

use crate::error::{ResolveError, ResolveResult};

/// Verifier for downloaded kit artifacts.
pub trait ImageVerifier: Send + Sync {
    /// Verify the artifact at `path`.
    ///
    /// On failure the artifact is left in place so a retry can resume or
    /// inspect it.
    fn verify(&self, path: &Path) -> ResolveResult<()>;
}

/// Verifier shelling out to the platform disk-image tool.
#[derive(Debug, Default)]
pub struct HdiutilVerifier;

impl ImageVerifier for HdiutilVerifier {
    fn verify(&self, path: &Path) -> ResolveResult<()> {
        let output = Command::new("hdiutil")
            .arg("verify")
            .arg(path)
            .output()
            .map_err(|e| ResolveError::IntegrityCheckFailed {
                path: path.to_path_buf(),
                detail: format!("failed to run hdiutil: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            warn!("Kit checksum verification failed: {}", stderr);
            return Err(ResolveError::IntegrityCheckFailed {
                path: path.to_path_buf(),
                detail: stderr,
            });
        }

        Ok(())
    }
}
