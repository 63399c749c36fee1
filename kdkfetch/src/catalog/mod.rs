//! Primary kit catalog client.
//!
//! Fetches the machine-readable catalog of published kits and returns the
//! entries sorted by (version, release date) descending, so a linear scan
//! always meets the most recent matching entry first. A fetch failure is a
//! distinct signal from an empty catalog: callers must fall back, not
//! conclude that no kits exist.

pub mod legacy;

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::blocking::Client;
use semver::Version;
use serde::Deserialize;
use tracing::{info, warn};

use crate::version;

/// Timeout for the catalog request.
const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Sentinel release date for entries with an empty or unparseable date.
///
/// Sorting descending, this epoch places undated entries strictly after
/// every dated one.
pub const SENTINEL_RELEASE_DATE: NaiveDateTime = NaiveDateTime::new(
    match NaiveDate::from_ymd_opt(1984, 1, 1) {
        Some(date) => date,
        None => panic!("sentinel date is valid"),
    },
    NaiveTime::MIN,
);

/// A published kit as described by the catalog.
#[derive(Debug, Clone)]
pub struct KitDescriptor {
    /// Parsed OS version the kit matches.
    pub version: Version,
    /// OS build identifier the kit matches.
    pub build: String,
    /// Release date of the kit.
    pub date: NaiveDateTime,
    /// Direct download URL.
    pub url: String,
}

/// Raw catalog record before parsing into a [`KitDescriptor`].
#[derive(Debug, Deserialize)]
struct RawKitRecord {
    version: String,
    build: String,
    #[serde(default)]
    date: String,
    url: String,
}

/// Catalog fetch errors.
#[derive(Debug)]
pub enum CatalogError {
    /// The catalog could not be fetched (timeout, connection failure or a
    /// non-success status). Distinct from an empty catalog.
    FetchFailed { reason: String },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FetchFailed { reason } => {
                write!(f, "failed to fetch kit catalog: {}", reason)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Source of published kit descriptors.
pub trait CatalogSource: Send + Sync {
    /// Fetch the catalog, sorted by (version, date) descending.
    fn fetch(&self) -> Result<Vec<KitDescriptor>, CatalogError>;
}

/// Catalog client backed by the primary kit API.
pub struct KdkCatalogClient {
    client: Client,
    url: String,
    user_agent: String,
}

impl KdkCatalogClient {
    /// Create a catalog client for the given endpoint.
    ///
    /// `app_version` is sent as part of the `User-Agent` header.
    pub fn new(url: impl Into<String>, app_version: &str) -> Self {
        let client = Client::builder()
            .timeout(CATALOG_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: url.into(),
            user_agent: format!("kdkfetch/{}", app_version),
        }
    }
}

impl CatalogSource for KdkCatalogClient {
    fn fetch(&self) -> Result<Vec<KitDescriptor>, CatalogError> {
        info!("Fetching available KDKs");

        let response = self
            .client
            .get(&self.url)
            .header("User-Agent", &self.user_agent)
            .send()
            .map_err(|e| {
                info!("Could not contact KDK API");
                CatalogError::FetchFailed {
                    reason: e.to_string(),
                }
            })?;

        if !response.status().is_success() {
            info!("Could not fetch KDK list");
            return Err(CatalogError::FetchFailed {
                reason: format!("status {}", response.status()),
            });
        }

        let records: Vec<serde_json::Value> =
            response.json().map_err(|e| CatalogError::FetchFailed {
                reason: e.to_string(),
            })?;

        Ok(parse_catalog(records))
    }
}

/// Parse raw catalog records into sorted descriptors.
///
/// Records missing required fields are skipped; malformed version or date
/// strings map to their sentinels so the entry sorts last rather than
/// aborting the fetch.
pub(crate) fn parse_catalog(records: Vec<serde_json::Value>) -> Vec<KitDescriptor> {
    let mut kits: Vec<KitDescriptor> = records
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawKitRecord>(value) {
            Ok(record) => Some(KitDescriptor {
                version: version::parse_or_sentinel(&record.version),
                build: record.build,
                date: parse_release_date(&record.date),
                url: record.url,
            }),
            Err(e) => {
                warn!("Skipping malformed catalog record: {}", e);
                None
            }
        })
        .collect();

    sort_kits(&mut kits);
    kits
}

/// Sort descriptors by (version, date) descending.
pub(crate) fn sort_kits(kits: &mut [KitDescriptor]) {
    kits.sort_by(|a, b| (&b.version, b.date).cmp(&(&a.version, a.date)));
}

/// Parse a catalog or database release date.
///
/// Accepts RFC 3339 timestamps, bare `YYYY-MM-DDTHH:MM:SS` timestamps and
/// plain `YYYY-MM-DD` dates. Empty or unparseable input maps to
/// [`SENTINEL_RELEASE_DATE`].
pub(crate) fn parse_release_date(raw: &str) -> NaiveDateTime {
    if raw.is_empty() {
        return SENTINEL_RELEASE_DATE;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.naive_utc();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return dt;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_time(NaiveTime::MIN);
    }
    SENTINEL_RELEASE_DATE
}

/// Generate the vendor's direct download URL for a given version and build.
///
/// Used when the catalog is unavailable and a URL must be constructed
/// without an existence check.
pub fn direct_download_url(version: &str, build: &str) -> String {
    format!(
        "https://download.developer.apple.com/macOS/Kernel_Debug_Kit_{version}_build_{build}/Kernel_Debug_Kit_{version}_build_{build}.dmg"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kit(version: &str, build: &str, date: &str, url: &str) -> serde_json::Value {
        json!({ "version": version, "build": build, "date": date, "url": url })
    }

    #[test]
    fn test_parse_catalog_sorts_descending() {
        let kits = parse_catalog(vec![
            kit("14.3", "23D56", "2024-01-23", "https://example.com/a"),
            kit("14.4", "23E214", "2024-03-07", "https://example.com/b"),
            kit("14.3.1", "23D60", "2024-02-10", "https://example.com/c"),
        ]);

        let versions: Vec<String> = kits.iter().map(|k| k.version.to_string()).collect();
        assert_eq!(versions, vec!["14.4.0", "14.3.1", "14.3.0"]);
    }

    #[test]
    fn test_parse_catalog_date_breaks_version_ties() {
        let kits = parse_catalog(vec![
            kit("14.4", "23E200", "2024-02-01", "https://example.com/old"),
            kit("14.4", "23E214", "2024-03-07", "https://example.com/new"),
        ]);

        assert_eq!(kits[0].build, "23E214");
        assert_eq!(kits[1].build, "23E200");
    }

    #[test]
    fn test_parse_catalog_malformed_version_sorts_last() {
        let kits = parse_catalog(vec![
            kit("borked", "XXXXX", "2024-03-07", "https://example.com/bad"),
            kit("13.0", "22A380", "2022-10-24", "https://example.com/ok"),
        ]);

        assert_eq!(kits[0].build, "22A380");
        assert_eq!(kits[1].version, crate::version::sentinel_version());
    }

    #[test]
    fn test_parse_catalog_empty_date_sorts_last_within_version() {
        let kits = parse_catalog(vec![
            kit("14.4", "23E100", "", "https://example.com/undated"),
            kit("14.4", "23E214", "2024-03-07", "https://example.com/dated"),
        ]);

        assert_eq!(kits[0].build, "23E214");
        assert_eq!(kits[1].date, SENTINEL_RELEASE_DATE);
    }

    #[test]
    fn test_parse_catalog_skips_records_missing_fields() {
        let kits = parse_catalog(vec![
            json!({ "version": "14.4" }),
            kit("14.4", "23E214", "2024-03-07", "https://example.com/b"),
        ]);

        assert_eq!(kits.len(), 1);
        assert_eq!(kits[0].build, "23E214");
    }

    #[test]
    fn test_parse_release_date_rfc3339() {
        let parsed = parse_release_date("2024-03-07T17:00:00-07:00");
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-03-08");
    }

    #[test]
    fn test_parse_release_date_plain_date() {
        let parsed = parse_release_date("2024-03-07");
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-03-07");
    }

    #[test]
    fn test_parse_release_date_sentinel() {
        assert_eq!(parse_release_date(""), SENTINEL_RELEASE_DATE);
        assert_eq!(parse_release_date("not-a-date"), SENTINEL_RELEASE_DATE);
    }

    #[test]
    fn test_direct_download_url_template() {
        let url = direct_download_url("14.4", "23E214");
        assert_eq!(
            url,
            "https://download.developer.apple.com/macOS/Kernel_Debug_Kit_14.4_build_23E214/Kernel_Debug_Kit_14.4_build_23E214.dmg"
        );
    }
}
