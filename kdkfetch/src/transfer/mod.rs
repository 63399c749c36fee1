//! Kit disk-image transfer.
//!
//! Two transports exist: a plain streamed GET for mirror-hosted copies, and
//! a portal-authorized transfer for the vendor's own servers, where a token
//! exchange must precede the fetch and the issued session cookies accompany
//! the download request.

pub mod verify;

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::SET_COOKIE;
use reqwest::Url;
use tracing::info;

use crate::error::{ResolveError, ResolveResult};

/// Default timeout for transfer requests.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Buffer size for streaming downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Progress callback invoked with (bytes downloaded, total bytes).
///
/// Total is 0 when the server does not announce a content length.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Transport for fetching a resolved kit URL to disk.
pub trait KitTransport: Send + Sync {
    /// Fetch `url` directly to `dest`.
    fn fetch_direct(&self, url: &str, dest: &Path) -> ResolveResult<u64>;

    /// Fetch `url` to `dest` after a portal token exchange.
    fn fetch_authorized(&self, url: &str, dest: &Path) -> ResolveResult<u64>;
}

/// Whether the resolved URL points at the mirror provider.
///
/// Decides the transport: mirror-hosted copies are fetched directly, vendor
/// URLs go through the portal-authorized path. Only the host component is
/// matched; an unparseable URL is treated as a vendor URL, never matched as
/// a bare substring.
pub fn is_mirror_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.contains("github")))
        .unwrap_or(false)
}

/// HTTP transport backed by a blocking client.
pub struct HttpTransport {
    client: Client,
    token_url: String,
    progress: Option<ProgressCallback>,
}

impl HttpTransport {
    /// Create a transport using the given portal token endpoint.
    pub fn new(token_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            token_url: token_url.into(),
            progress: None,
        }
    }

    /// Attach a progress callback invoked during streaming.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Exchange the candidate path for portal session cookies.
    fn authorize(&self, url: &str) -> ResolveResult<String> {
        let remote_path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(e) => {
                return Err(ResolveError::TransferFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let response = self
            .client
            .get(&self.token_url)
            .query(&[("path", remote_path.as_str())])
            .send()
            .map_err(|e| ResolveError::TransferFailed {
                url: url.to_string(),
                reason: format!("token request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(ResolveError::TransferFailed {
                url: url.to_string(),
                reason: format!("token request failed with status {}", response.status()),
            });
        }

        // The session cookie is the download authorization; forward the
        // name=value pairs on the fetch itself.
        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::to_string)
            .collect();

        Ok(cookies.join("; "))
    }

    fn stream_to_file(&self, url: &str, mut response: Response, dest: &Path) -> ResolveResult<u64> {
        let total_size = response.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResolveError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = File::create(dest).map_err(|e| ResolveError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;

        loop {
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| ResolveError::TransferFailed {
                    url: url.to_string(),
                    reason: format!("read error: {}", e),
                })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| ResolveError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            downloaded += bytes_read as u64;

            if let Some(ref cb) = self.progress {
                cb(downloaded, total_size);
            }
        }

        writer.flush().map_err(|e| ResolveError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        Ok(downloaded)
    }

    fn fetch(&self, url: &str, dest: &Path, cookies: Option<&str>) -> ResolveResult<u64> {
        let mut request = self.client.get(url);
        if let Some(cookies) = cookies {
            if !cookies.is_empty() {
                request = request.header("Cookie", cookies);
            }
        }

        let response = request.send().map_err(|e| ResolveError::TransferFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(ResolveError::TransferFailed {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", response.status()),
            });
        }

        self.stream_to_file(url, response, dest)
    }
}

impl KitTransport for HttpTransport {
    fn fetch_direct(&self, url: &str, dest: &Path) -> ResolveResult<u64> {
        info!("Downloading kit from mirror");
        self.fetch(url, dest, None)
    }

    fn fetch_authorized(&self, url: &str, dest: &Path) -> ResolveResult<u64> {
        info!("Downloading kit from distribution servers");
        let cookies = self.authorize(url)?;
        self.fetch(url, dest, Some(&cookies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_host_detection() {
        assert!(is_mirror_host(
            "https://github.com/dortania/KdkSupportPkg/releases/download/23E214/kit.dmg"
        ));
        assert!(is_mirror_host(
            "https://objects.githubusercontent.com/release-assets/kit.dmg"
        ));
        assert!(!is_mirror_host(
            "https://download.developer.apple.com/macOS/Kernel_Debug_Kit_14.4_build_23E214/Kernel_Debug_Kit_14.4_build_23E214.dmg"
        ));
    }

    #[test]
    fn test_mirror_host_ignores_path_component() {
        assert!(!is_mirror_host("https://example.com/github/kit.dmg"));
    }

    #[test]
    fn test_mirror_host_unparseable_url_is_not_a_mirror() {
        // Relative or garbage input never matches, even with "github" in it.
        assert!(!is_mirror_host("github-mirror-without-scheme/kit.dmg"));
        assert!(!is_mirror_host("not a url"));
    }
}
