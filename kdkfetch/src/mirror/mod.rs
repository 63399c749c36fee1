//! Community mirror lookup, used as the last resort.
//!
//! When the vendor portal is down, a community-run repository re-hosts kit
//! disk images as release assets tagged by build. Lookup is best effort: a
//! non-success status and an absent build both come back as "no mirror".

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::info;

/// File extension of mirrored kit archives.
const ARCHIVE_EXT: &str = ".dmg";

/// A release in the mirror catalog.
#[derive(Debug, Deserialize)]
pub(crate) struct MirrorRelease {
    pub(crate) tag_name: String,
    #[serde(default)]
    pub(crate) assets: Vec<MirrorAsset>,
}

/// An asset attached to a mirror release.
#[derive(Debug, Deserialize)]
pub(crate) struct MirrorAsset {
    pub(crate) name: String,
    pub(crate) browser_download_url: String,
}

/// Source of pre-mirrored kit copies.
pub trait MirrorSource: Send + Sync {
    /// Look up a mirrored copy of the given build.
    fn find_backup(&self, build: &str) -> Option<String>;
}

/// Mirror client backed by a release catalog API.
pub struct GithubMirrorClient {
    client: Client,
    url: String,
}

impl GithubMirrorClient {
    /// Create a mirror client for the given release catalog endpoint.
    ///
    /// Lookup is best effort: the request carries no explicit timeout.
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: url.into(),
        }
    }
}

impl MirrorSource for GithubMirrorClient {
    fn find_backup(&self, build: &str) -> Option<String> {
        let response = match self.client.get(&self.url).send() {
            Ok(response) => response,
            Err(e) => {
                info!("Could not contact kit mirror repository: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            info!("Could not contact kit mirror repository");
            return None;
        }

        let releases: Vec<MirrorRelease> = match response.json() {
            Ok(releases) => releases,
            Err(e) => {
                info!("Could not parse kit mirror catalog: {}", e);
                return None;
            }
        };

        first_archive_asset(&releases, build)
    }
}

/// Find the first archive asset of the release tagged exactly `build`.
pub(crate) fn first_archive_asset(releases: &[MirrorRelease], build: &str) -> Option<String> {
    for release in releases {
        if release.tag_name != build {
            continue;
        }
        info!("Found kit mirror for build: {}", build);
        for asset in &release.assets {
            if asset.name.ends_with(ARCHIVE_EXT) {
                return Some(asset.browser_download_url.clone());
            }
        }
    }

    info!("Could not find kit mirror for build {}", build);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str, assets: Vec<(&str, &str)>) -> MirrorRelease {
        MirrorRelease {
            tag_name: tag.to_string(),
            assets: assets
                .into_iter()
                .map(|(name, url)| MirrorAsset {
                    name: name.to_string(),
                    browser_download_url: url.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_finds_archive_for_exact_tag() {
        let releases = vec![
            release("23D60", vec![("KDK_14.3.1_23D60.dmg", "https://mirror/23D60.dmg")]),
            release("23E214", vec![("KDK_14.4_23E214.dmg", "https://mirror/23E214.dmg")]),
        ];

        assert_eq!(
            first_archive_asset(&releases, "23E214"),
            Some("https://mirror/23E214.dmg".to_string())
        );
    }

    #[test]
    fn test_skips_non_archive_assets() {
        let releases = vec![release(
            "23E214",
            vec![
                ("checksums.txt", "https://mirror/checksums.txt"),
                ("KDK_14.4_23E214.dmg", "https://mirror/23E214.dmg"),
            ],
        )];

        assert_eq!(
            first_archive_asset(&releases, "23E214"),
            Some("https://mirror/23E214.dmg".to_string())
        );
    }

    #[test]
    fn test_missing_build_returns_none() {
        let releases = vec![release("23D60", vec![("a.dmg", "https://mirror/a.dmg")])];
        assert_eq!(first_archive_asset(&releases, "23E214"), None);
    }

    #[test]
    fn test_release_without_archive_asset_returns_none() {
        let releases = vec![release("23E214", vec![("notes.txt", "https://mirror/n.txt")])];
        assert_eq!(first_archive_asset(&releases, "23E214"), None);
    }
}
