//! Top-level kit resolution state machine.
//!
//! Sequences the full cascade: local-cache short circuit, catalog
//! resolution (with legacy-database fallback), portal probes for the
//! primary and closest-match candidates, mirror lookup as last resort,
//! transfer, integrity verification and cache pruning. Every failure mode
//! is converted into a plain-text outcome; no network or filesystem fault
//! crosses this boundary.

use std::path::PathBuf;

use semver::Version;
use tracing::info;

use crate::cache::{LocalCacheManager, PrivilegedRemover};
use crate::catalog::legacy::{FallbackMatcher, LegacyDbMatcher};
use crate::catalog::{self, CatalogSource, KdkCatalogClient};
use crate::config::KdkConfig;
use crate::mirror::{GithubMirrorClient, MirrorSource};
use crate::portal::{DeveloperPortalProbe, PortalGate, ProbeResult};
use crate::transfer::verify::{HdiutilVerifier, ImageVerifier};
use crate::transfer::{self, HttpTransport, KitTransport};
use crate::version;

/// Failure message when resolution finds neither an exact nor a close kit.
const MSG_NO_MATCH: &str = "Could not find KDK for host, nor closest match";

/// Failure message when the servers confirm neither candidate exists.
const MSG_NO_MATCH_ON_SERVERS: &str =
    "Could not find KDK for host on Apple's servers, nor closest match";

/// Failure message when the portal cannot be contacted.
const MSG_PORTAL_DOWN: &str = "Could not contact Apple download servers";

/// Appended to the portal-down message when the mirror has no copy either.
const MSG_NO_BACKUP: &str = " and could not find a backup copy online";

/// Failure message when the network itself is unreachable.
const MSG_NETWORK_DOWN: &str = "Failed to connect to the internet";

/// Failure message for unexpected probe outcomes.
const MSG_UNKNOWN: &str = "Unknown error";

/// Failure message when the transfer itself fails.
const MSG_DOWNLOAD_FAILED: &str = "Failed to download KDK";

/// Failure message when the downloaded image fails verification.
const MSG_CHECKSUM_FAILED: &str = "Kernel Debug Kit checksum verification failed, please try again.\n\nIf this continues to fail, ensure you're downloading on a stable network connection (ie. Ethernet)";

/// Outcome of a resolution, the only value crossing the outer boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Whether a matching kit is now installed or downloaded.
    pub success: bool,
    /// Plain-text failure message; empty on success.
    pub message: String,
    /// Build the caller should treat as resolved; empty on failure.
    pub resolved_build: String,
}

impl Resolution {
    fn success(build: &str) -> Self {
        Self {
            success: true,
            message: String::new(),
            resolved_build: build.to_string(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        info!("{}", message);
        Self {
            success: false,
            message,
            resolved_build: String::new(),
        }
    }
}

/// Orchestrator for resolving, downloading and caching a kit.
pub struct DownloadOrchestrator<R: PrivilegedRemover> {
    cache: LocalCacheManager<R>,
    catalog: Box<dyn CatalogSource>,
    fallback: Box<dyn FallbackMatcher>,
    portal: Box<dyn PortalGate>,
    mirror: Box<dyn MirrorSource>,
    transport: Box<dyn KitTransport>,
    verifier: Box<dyn ImageVerifier>,
    download_path: PathBuf,
}

impl<R: PrivilegedRemover> DownloadOrchestrator<R> {
    /// Create an orchestrator with production components from `config`.
    pub fn new(config: &KdkConfig, remover: R) -> Self {
        Self {
            cache: LocalCacheManager::new(&config.cache_root, config.prune_enabled, remover),
            catalog: Box::new(KdkCatalogClient::new(
                &config.catalog_url,
                &config.app_version,
            )),
            fallback: Box::new(LegacyDbMatcher::new(&config.legacy_db_url)),
            portal: Box::new(DeveloperPortalProbe::new(&config.portal_token_url)),
            mirror: Box::new(GithubMirrorClient::new(&config.mirror_api_url)),
            transport: Box::new(HttpTransport::new(&config.portal_token_url)),
            verifier: Box::new(HdiutilVerifier),
            download_path: config.download_path.clone(),
        }
    }

    /// Create an orchestrator from explicit components.
    ///
    /// Intended for embedders that supply their own transports or probes,
    /// and for tests.
    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        cache: LocalCacheManager<R>,
        catalog: Box<dyn CatalogSource>,
        fallback: Box<dyn FallbackMatcher>,
        portal: Box<dyn PortalGate>,
        mirror: Box<dyn MirrorSource>,
        transport: Box<dyn KitTransport>,
        verifier: Box<dyn ImageVerifier>,
        download_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cache,
            catalog,
            fallback,
            portal,
            mirror,
            transport,
            verifier,
            download_path: download_path.into(),
        }
    }

    /// Resolve the best available kit for `(version, build)`, download it if
    /// necessary, verify it and reconcile the local cache.
    ///
    /// On the closest-match and mirror paths the *requested* build is
    /// reported as resolved even though a different artifact was installed;
    /// callers key follow-up work on the requested build.
    pub fn resolve_and_install(&self, version: &str, build: &str) -> Resolution {
        if self.cache.is_installed(build) {
            info!("KDK is already installed");
            self.cache.prune_unused(&[build.to_string()]);
            return Resolution::success(build);
        }

        let target = version::parse_or_sentinel(version);
        let (primary, closest) = self.resolve_candidates(version, build, &target);

        info!("Checking for KDK matching macOS {} build {}", version, build);

        // No primary candidate means the file is known to be absent without
        // asking the portal.
        let probe = match &primary {
            Some(link) => self.portal.verify(link),
            None => ProbeResult::Unavailable,
        };

        let link = match probe {
            ProbeResult::Available => match primary {
                Some(link) => link,
                None => return Resolution::failure(MSG_UNKNOWN),
            },
            ProbeResult::Unavailable => {
                info!("Could not find KDK, finding closest match");
                match self.resolve_closest(build, &closest) {
                    Ok(link) => link,
                    Err(resolution) => return resolution,
                }
            }
            ProbeResult::PortalDown => match self.mirror.find_backup(build) {
                Some(link) => link,
                None => {
                    return Resolution::failure(format!("{}{}", MSG_PORTAL_DOWN, MSG_NO_BACKUP))
                }
            },
            ProbeResult::NetworkDown => return Resolution::failure(MSG_NETWORK_DOWN),
        };

        self.transfer_and_verify(&link, build, &closest.build)
    }

    /// Produce the primary (exact build) and closest-match candidates.
    ///
    /// On catalog success a single linear scan of the sorted list records
    /// the exact-build entry and the first entry within (same major, minor
    /// or minor−1) at or below the target. On catalog failure the primary is
    /// constructed from the URL template without an existence check and the
    /// closest match comes from the legacy database.
    fn resolve_candidates(
        &self,
        version: &str,
        build: &str,
        target: &Version,
    ) -> (Option<String>, catalog::legacy::ResolutionCandidate) {
        match self.catalog.fetch() {
            Ok(kits) => {
                let mut primary = None;
                let mut closest = catalog::legacy::ResolutionCandidate::none();

                for kit in &kits {
                    if kit.build == build {
                        primary = Some(kit.url.clone());
                    } else if closest.link.is_none()
                        && kit.version <= *target
                        && kit.version.major == target.major
                        && (kit.version.minor == target.minor
                            || kit.version.minor + 1 == target.minor)
                    {
                        // The list is sorted by version then date, so the
                        // first qualifying entry is the closest.
                        closest = catalog::legacy::ResolutionCandidate {
                            link: Some(kit.url.clone()),
                            version: kit.version.to_string(),
                            build: kit.build.clone(),
                        };
                    }
                }

                (primary, closest)
            }
            Err(_) => {
                info!("Could not fetch KDK list, falling back to brute force");
                let primary = Some(catalog::direct_download_url(version, build));
                let closest = self.fallback.closest_match(target, build);
                (primary, closest)
            }
        }
    }

    /// Resolve the closest-match candidate after the primary was confirmed
    /// absent.
    ///
    /// Returns the download link to use, or the final resolution when the
    /// cascade ends here (closest already installed, nothing to fall back
    /// to, or a terminal failure).
    fn resolve_closest(
        &self,
        build: &str,
        closest: &catalog::legacy::ResolutionCandidate,
    ) -> Result<String, Resolution> {
        if !closest.build.is_empty() && self.cache.is_installed(&closest.build) {
            info!("Closest build ({}) already installed", closest.build);
            self.cache
                .prune_unused(&[build.to_string(), closest.build.clone()]);
            return Err(Resolution::success(&closest.build));
        }

        let Some(ref link) = closest.link else {
            return Err(Resolution::failure(MSG_NO_MATCH));
        };

        info!("Closest match: {} build {}", closest.version, closest.build);

        match self.portal.verify(link) {
            ProbeResult::Available => Ok(link.clone()),
            ProbeResult::Unavailable => Err(Resolution::failure(MSG_NO_MATCH_ON_SERVERS)),
            ProbeResult::PortalDown => match self.mirror.find_backup(&closest.build) {
                Some(mirror_link) => Ok(mirror_link),
                None => Err(Resolution::failure(format!(
                    "{}{}",
                    MSG_PORTAL_DOWN, MSG_NO_BACKUP
                ))),
            },
            ProbeResult::NetworkDown => Err(Resolution::failure(MSG_UNKNOWN)),
        }
    }

    /// Transfer the resolved link, verify the artifact and prune the cache.
    fn transfer_and_verify(&self, link: &str, build: &str, closest_build: &str) -> Resolution {
        let fetched = if transfer::is_mirror_host(link) {
            self.transport.fetch_direct(link, &self.download_path)
        } else {
            self.transport.fetch_authorized(link, &self.download_path)
        };

        if let Err(e) = fetched {
            info!("Download failed: {}", e);
            return Resolution::failure(MSG_DOWNLOAD_FAILED);
        }

        // The partial artifact is deliberately left in place on failure.
        if self.verifier.verify(&self.download_path).is_err() {
            return Resolution::failure(MSG_CHECKSUM_FAILED);
        }

        self.cache
            .prune_unused(&[build.to_string(), closest_build.to_string()]);
        Resolution::success(build)
    }
}
