//! Vendor distribution portal probe.
//!
//! Checks whether a candidate download URL is actually servable before
//! committing to a transfer. The probe distinguishes four outcomes: the file
//! is available, the file is confirmed absent while the portal is healthy,
//! the portal is down, and the network itself is down.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use tracing::info;

/// Timeout for the token request.
const TOKEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Response body substring that confirms the requested path does not exist.
const INVALID_PATH_MARKER: &str = "The path specified is invalid";

/// Outcome of probing a candidate download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// Portal is up and the file is available.
    Available,
    /// Portal is up but the file does not exist.
    Unavailable,
    /// Portal could not be reached or answered with an unexpected error.
    PortalDown,
    /// The network itself is unreachable.
    NetworkDown,
}

/// Gate that decides whether a candidate URL is fetchable.
pub trait PortalGate: Send + Sync {
    /// Probe the given download URL without transferring it.
    fn verify(&self, url: &str) -> ProbeResult;
}

/// Probe backed by the vendor portal's authorization-token endpoint.
pub struct DeveloperPortalProbe {
    client: Client,
    token_url: String,
}

impl DeveloperPortalProbe {
    /// Create a probe for the given token endpoint.
    ///
    /// The endpoint doubles as the connectivity-check target.
    pub fn new(token_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(TOKEN_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            token_url: token_url.into(),
        }
    }

    /// Lightweight connectivity check against the portal health endpoint.
    fn network_reachable(&self) -> bool {
        self.client.head(&self.token_url).send().is_ok()
    }
}

impl PortalGate for DeveloperPortalProbe {
    fn verify(&self, url: &str) -> ProbeResult {
        if !self.network_reachable() {
            info!("Could not connect to the network");
            return ProbeResult::NetworkDown;
        }

        // The token endpoint takes the candidate's path component as a query
        // parameter and answers 400 with a marker body for unknown paths.
        let remote_path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => {
                info!("Malformed candidate URL: {}", url);
                return ProbeResult::Unavailable;
            }
        };

        let response = match self
            .client
            .get(&self.token_url)
            .query(&[("path", remote_path.as_str())])
            .send()
        {
            Ok(response) => response,
            Err(_) => {
                info!("Could not contact download servers");
                return ProbeResult::PortalDown;
            }
        };

        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        classify_token_response(status, &body)
    }
}

/// Classify the token endpoint's answer.
///
/// A 400 carrying the invalid-path marker means the specific file does not
/// exist while the portal itself is healthy; any other error status means
/// the portal is down.
pub(crate) fn classify_token_response(status: u16, body: &str) -> ProbeResult {
    if (200..300).contains(&status) {
        return ProbeResult::Available;
    }
    if status == 400 && body.contains(INVALID_PATH_MARKER) {
        info!("File does not exist on download servers");
        return ProbeResult::Unavailable;
    }
    info!("Could not request download authorization from download servers");
    ProbeResult::PortalDown
}
