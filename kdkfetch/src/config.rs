//! Configuration for kit resolution.

use std::path::PathBuf;

/// Default primary catalog endpoint.
pub const DEFAULT_CATALOG_URL: &str = "https://kdk-api.dhinak.net/v1";

/// Default legacy OS-build database endpoint.
pub const DEFAULT_LEGACY_DB_URL: &str = "https://api.appledb.dev/main.json";

/// Default vendor portal token/health endpoint.
pub const DEFAULT_PORTAL_TOKEN_URL: &str =
    "https://developerservices2.apple.com/services/download";

/// Default community mirror release catalog.
pub const DEFAULT_MIRROR_API_URL: &str =
    "https://api.github.com/repos/dortania/KdkSupportPkg/releases";

/// Default directory holding installed kits.
pub const DEFAULT_CACHE_ROOT: &str = "/Library/Developer/KDKs";

/// Configuration for the kit resolver.
///
/// Replaces the ambient global state of earlier designs: pruning is an
/// explicit flag here, and every remote endpoint can be overridden so tests
/// can point components at fixtures.
#[derive(Debug, Clone)]
pub struct KdkConfig {
    /// Directory where installed kits live.
    pub cache_root: PathBuf,

    /// Destination path for the downloaded disk image.
    pub download_path: PathBuf,

    /// Whether unused kits may be pruned from the cache root.
    pub prune_enabled: bool,

    /// Version string of the calling application, sent as part of the
    /// `User-Agent` header on catalog requests.
    pub app_version: String,

    /// Primary catalog endpoint.
    pub catalog_url: String,

    /// Legacy OS-build database endpoint.
    pub legacy_db_url: String,

    /// Vendor portal token endpoint (also used for the connectivity check).
    pub portal_token_url: String,

    /// Community mirror release catalog endpoint.
    pub mirror_api_url: String,
}

impl Default for KdkConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(DEFAULT_CACHE_ROOT),
            download_path: std::env::temp_dir().join("KernelDebugKit.dmg"),
            prune_enabled: false,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            legacy_db_url: DEFAULT_LEGACY_DB_URL.to_string(),
            portal_token_url: DEFAULT_PORTAL_TOKEN_URL.to_string(),
            mirror_api_url: DEFAULT_MIRROR_API_URL.to_string(),
        }
    }
}

impl KdkConfig {
    /// Create a configuration with the given cache root.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Default::default()
        }
    }

    /// Set the download destination path.
    pub fn with_download_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_path = path.into();
        self
    }

    /// Enable or disable pruning of unused kits.
    pub fn with_prune_enabled(mut self, enabled: bool) -> Self {
        self.prune_enabled = enabled;
        self
    }

    /// Set the calling application's version string.
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    /// Override the primary catalog endpoint.
    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = url.into();
        self
    }

    /// Override the legacy database endpoint.
    pub fn with_legacy_db_url(mut self, url: impl Into<String>) -> Self {
        self.legacy_db_url = url.into();
        self
    }

    /// Override the portal token endpoint.
    pub fn with_portal_token_url(mut self, url: impl Into<String>) -> Self {
        self.portal_token_url = url.into();
        self
    }

    /// Override the mirror release catalog endpoint.
    pub fn with_mirror_api_url(mut self, url: impl Into<String>) -> Self {
        self.mirror_api_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KdkConfig::default();
        assert_eq!(config.cache_root, PathBuf::from(DEFAULT_CACHE_ROOT));
        assert!(!config.prune_enabled);
        assert_eq!(config.catalog_url, DEFAULT_CATALOG_URL);
    }

    #[test]
    fn test_builder_pattern() {
        let config = KdkConfig::new("/tmp/kdks")
            .with_download_path("/tmp/kit.dmg")
            .with_prune_enabled(true)
            .with_app_version("2.0.0")
            .with_catalog_url("http://localhost:9999/v1");

        assert_eq!(config.cache_root, PathBuf::from("/tmp/kdks"));
        assert_eq!(config.download_path, PathBuf::from("/tmp/kit.dmg"));
        assert!(config.prune_enabled);
        assert_eq!(config.app_version, "2.0.0");
        assert_eq!(config.catalog_url, "http://localhost:9999/v1");
        assert_eq!(config.legacy_db_url, DEFAULT_LEGACY_DB_URL);
    }
}
