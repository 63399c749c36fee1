//! Local cache of installed kits.
//!
//! Installed kits are subdirectories of the cache root named with a
//! `.<build>.kdk` suffix. A kit only counts as installed if a fixed set of
//! marker files exists beneath it; anything else is a corrupted install and
//! is removed on sight rather than reported as installed.
//!
//! Deletions go through an injected [`PrivilegedRemover`] capability because
//! the cache root is typically owned by root. The design assumes a single
//! writer; concurrent resolutions against the same root must be serialized
//! by the caller.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Suffix that identifies a kit directory in the cache root.
const KIT_SUFFIX: &str = ".kdk";

/// Subpath beneath a kit directory holding the marker files.
const MARKER_ROOT: &str = "System/Library/Extensions";

/// Marker files that must all exist for a kit to count as installed.
const REQUIRED_MARKERS: [&str; 4] = [
    "System.kext/PlugIns/Libkern.kext/Libkern",
    "apfs.kext/Contents/MacOS/apfs",
    "IOUSBHostFamily.kext/Contents/MacOS/IOUSBHostFamily",
    "AMDRadeonX6000.kext/Contents/MacOS/AMDRadeonX6000",
];

/// Capability for deleting cache entries that may require elevation.
///
/// Injected so the cache manager is testable without real elevated
/// permissions; embedders supply an implementation that shells out through
/// their privilege-elevation mechanism.
pub trait PrivilegedRemover: Send + Sync {
    /// Remove the directory at `path` recursively.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Remover for cache roots writable by the current process.
#[derive(Debug, Default)]
pub struct DirectRemover;

impl PrivilegedRemover for DirectRemover {
    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// Manager for the installed-kits directory.
pub struct LocalCacheManager<R: PrivilegedRemover> {
    root: PathBuf,
    prune_enabled: bool,
    remover: R,
}

impl<R: PrivilegedRemover> LocalCacheManager<R> {
    /// Create a cache manager over the given root directory.
    pub fn new(root: impl Into<PathBuf>, prune_enabled: bool, remover: R) -> Self {
        Self {
            root: root.into(),
            prune_enabled,
            remover,
        }
    }

    /// Get the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check whether a kit for `build` is installed and intact.
    ///
    /// A directory carrying the build suffix but missing any marker file is
    /// a corrupted install: it is removed and reported as not installed.
    pub fn is_installed(&self, build: &str) -> bool {
        let suffix = format!("{}{}", build, KIT_SUFFIX);

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return false,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if !name.to_string_lossy().ends_with(&suffix) {
                continue;
            }

            let marker_root = path.join(MARKER_ROOT);
            for marker in REQUIRED_MARKERS {
                if !marker_root.join(marker).exists() {
                    warn!(
                        "Corrupted KDK found, removing due to missing: {}",
                        marker_root.join(marker).display()
                    );
                    if let Err(e) = self.remover.remove(&path) {
                        warn!("Failed to remove corrupted kit {}: {}", path.display(), e);
                    }
                    return false;
                }
            }
            return true;
        }

        false
    }

    /// Remove cached kits whose build is not in the exclusion set.
    ///
    /// No-op when pruning is disabled, when the cache root does not exist,
    /// or when `exclude` is empty. An empty exclusion set means the caller
    /// is not ready to prune, not "prune everything"; treating it otherwise
    /// would wipe the whole cache. Empty build strings inside a non-empty
    /// set are ignored during matching.
    pub fn prune_unused(&self, exclude: &[String]) {
        if !self.prune_enabled {
            return;
        }
        if !self.root.exists() {
            return;
        }
        if exclude.is_empty() {
            return;
        }

        info!("Cleaning unused KDKs");
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not read cache root {}: {}", self.root.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(KIT_SUFFIX) {
                continue;
            }

            let keep = exclude.iter().any(|build| {
                !build.is_empty() && name.ends_with(&format!("{}{}", build, KIT_SUFFIX))
            });
            if keep {
                continue;
            }

            info!("Removing {}", name);
            if let Err(e) = self.remover.remove(&path) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
