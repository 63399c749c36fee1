//! Fallback resolver against the legacy OS-build database.
//!
//! Used only when the primary catalog signals a fetch failure. The database
//! is a general-purpose, manually maintained listing of OS builds, so its
//! version strings are free text and its release dates may be empty; both
//! map to sentinels so malformed rows sort last instead of breaking the
//! scan.
//!
//! The database is usually a few days behind new kit releases, so matching
//! here is deliberately stricter than the catalog scan: only builds with the
//! host's exact major.minor qualify.

use reqwest::blocking::Client;
use semver::Version;
use serde::Deserialize;
use tracing::{info, warn};

use super::{direct_download_url, parse_release_date};
use crate::version;

/// Type discriminator for desktop-OS rows in the database.
const DESKTOP_OS_MARKER: &str = "macOS";

/// A candidate kit produced by catalog search or legacy matching.
///
/// `link == None` means no candidate was found.
#[derive(Debug, Clone, Default)]
pub struct ResolutionCandidate {
    /// Resolvable download URL, if a candidate was found.
    pub link: Option<String>,
    /// Version string of the candidate.
    pub version: String,
    /// Build identifier of the candidate.
    pub build: String,
}

impl ResolutionCandidate {
    /// The "no candidate found" value.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Fallback source of closest-match candidates.
pub trait FallbackMatcher: Send + Sync {
    /// Find the closest usable build at or below the host version.
    ///
    /// Never returns the host's own build: that build is the one already
    /// failing to resolve, not a useful fallback.
    fn closest_match(&self, host_version: &Version, host_build: &str) -> ResolutionCandidate;
}

/// Raw database row.
#[derive(Debug, Deserialize)]
struct RawOsBuild {
    #[serde(rename = "osType")]
    os_type: String,
    version: String,
    build: String,
    #[serde(default)]
    released: String,
}

/// Parsed desktop-OS row ready for selection.
#[derive(Debug, Clone)]
pub(crate) struct LegacyEntry {
    /// Version parsed from the leading dotted token; `None` if the free-text
    /// version carries no such token.
    pub(crate) version: Option<Version>,
    /// The raw token, kept for URL generation (versions like `14.3` must not
    /// be renormalized to `14.3.0` in generated links).
    pub(crate) version_token: String,
    pub(crate) build: String,
    pub(crate) released: chrono::NaiveDateTime,
}

/// Matcher backed by the legacy OS-build database.
pub struct LegacyDbMatcher {
    client: Client,
    url: String,
}

impl LegacyDbMatcher {
    /// Create a matcher for the given database endpoint.
    ///
    /// The database request is best effort: no explicit timeout beyond the
    /// client default.
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: url.into(),
        }
    }

    fn fetch_entries(&self) -> Option<Vec<LegacyEntry>> {
        let response = match self.client.get(&self.url).send() {
            Ok(response) => response,
            Err(e) => {
                info!("Could not contact OS build database: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            info!("Could not fetch OS build database");
            return None;
        }

        let body: serde_json::Value = match response.json() {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not parse OS build database: {}", e);
                return None;
            }
        };

        let rows = body.get("ios").and_then(|v| v.as_array()).cloned()?;
        Some(parse_entries(rows))
    }
}

impl FallbackMatcher for LegacyDbMatcher {
    fn closest_match(&self, host_version: &Version, host_build: &str) -> ResolutionCandidate {
        info!(
            "Checking closest match for: {} build {}",
            host_version, host_build
        );

        match self.fetch_entries() {
            Some(entries) => select_closest(&entries, host_version, host_build),
            None => ResolutionCandidate::none(),
        }
    }
}

/// Parse raw rows into desktop-OS entries, sorted by (version, date)
/// descending with sentinels for malformed fields.
pub(crate) fn parse_entries(rows: Vec<serde_json::Value>) -> Vec<LegacyEntry> {
    let mut entries: Vec<LegacyEntry> = rows
        .into_iter()
        .filter_map(|value| serde_json::from_value::<RawOsBuild>(value).ok())
        .filter(|row| row.os_type == DESKTOP_OS_MARKER)
        .map(|row| {
            let token = version::leading_version_token(&row.version).map(str::to_string);
            LegacyEntry {
                version: token.as_deref().and_then(version::parse_lenient),
                version_token: token.unwrap_or_default(),
                build: row.build,
                released: parse_release_date(&row.released),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        let a_key = (
            a.version.clone().unwrap_or_else(version::sentinel_version),
            a.released,
        );
        let b_key = (
            b.version.clone().unwrap_or_else(version::sentinel_version),
            b.released,
        );
        b_key.cmp(&a_key)
    });
    entries
}

/// Scan sorted entries for the closest usable build.
///
/// Skips entries without a parseable version and the host's own build;
/// selects the first entry whose version is at or below the host's with the
/// same major and minor. The list is already sorted descending, so the first
/// match is the most recent.
pub(crate) fn select_closest(
    entries: &[LegacyEntry],
    host_version: &Version,
    host_build: &str,
) -> ResolutionCandidate {
    for entry in entries {
        let Some(ref entry_version) = entry.version else {
            continue;
        };
        if entry.build == host_build {
            continue;
        }
        if entry_version <= host_version
            && entry_version.major == host_version.major
            && entry_version.minor == host_version.minor
        {
            info!("Closest match: {} build {}", entry.version_token, entry.build);
            return ResolutionCandidate {
                link: Some(direct_download_url(&entry.version_token, &entry.build)),
                version: entry.version_token.clone(),
                build: entry.build.clone(),
            };
        }
    }

    info!("Could not find a match");
    ResolutionCandidate::none()
}
