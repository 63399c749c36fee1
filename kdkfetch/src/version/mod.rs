//! Lenient OS version parsing and ordering.
//!
//! Host and catalog version strings are not reliable semver: `14.4` has no
//! patch component and legacy database entries carry free text like
//! `14.3 Beta 2`. This module completes partial versions, extracts the
//! leading dotted token from noisy strings, and maps anything unparseable to
//! a documented sentinel so malformed entries sort last instead of aborting
//! a resolution.

use std::sync::OnceLock;

use regex::Regex;
use semver::Version;

static VERSION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn version_pattern() -> &'static Regex {
    VERSION_PATTERN.get_or_init(|| {
        Regex::new(r"^\d+\.\d+(\.\d+)?").expect("version pattern is valid")
    })
}

/// Sentinel for versions that could not be parsed.
///
/// Sorting descending, `0.0.0` places malformed entries strictly after every
/// well-formed version. This is a visible contract of the ordering, not a
/// parser accident.
pub fn sentinel_version() -> Version {
    Version::new(0, 0, 0)
}

/// Extract a leading `major.minor(.patch)` token from a noisy string.
///
/// Returns `None` if the string does not start with a dotted numeric token.
///
/// # Examples
///
/// ```
/// use kdkfetch::version::leading_version_token;
///
/// assert_eq!(leading_version_token("14.3 Beta 2"), Some("14.3"));
/// assert_eq!(leading_version_token("13.0.1"), Some("13.0.1"));
/// assert_eq!(leading_version_token("Beta 14.3"), None);
/// ```
pub fn leading_version_token(raw: &str) -> Option<&str> {
    version_pattern().find(raw).map(|m| m.as_str())
}

/// Parse a dotted version string, completing missing components with zero.
///
/// Accepts one to three numeric components; anything else yields `None`.
///
/// # Examples
///
/// ```
/// use semver::Version;
/// use kdkfetch::version::parse_lenient;
///
/// assert_eq!(parse_lenient("14.4"), Some(Version::new(14, 4, 0)));
/// assert_eq!(parse_lenient("13.0.1"), Some(Version::new(13, 0, 1)));
/// assert_eq!(parse_lenient("garbage"), None);
/// ```
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let mut components = [0u64; 3];
    let mut count = 0;

    for part in raw.trim().split('.') {
        if count == components.len() {
            return None;
        }
        components[count] = part.parse().ok()?;
        count += 1;
    }

    Some(Version::new(components[0], components[1], components[2]))
}

/// Parse a version string, falling back to the sentinel on malformed input.
pub fn parse_or_sentinel(raw: &str) -> Version {
    parse_lenient(raw).unwrap_or_else(sentinel_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient_two_components() {
        assert_eq!(parse_lenient("14.4"), Some(Version::new(14, 4, 0)));
    }

    #[test]
    fn test_parse_lenient_three_components() {
        assert_eq!(parse_lenient("13.0.1"), Some(Version::new(13, 0, 1)));
    }

    #[test]
    fn test_parse_lenient_single_component() {
        assert_eq!(parse_lenient("14"), Some(Version::new(14, 0, 0)));
    }

    #[test]
    fn test_parse_lenient_rejects_garbage() {
        assert_eq!(parse_lenient(""), None);
        assert_eq!(parse_lenient("14.4 Beta"), None);
        assert_eq!(parse_lenient("1.2.3.4"), None);
    }

    #[test]
    fn test_parse_or_sentinel_malformed() {
        assert_eq!(parse_or_sentinel("borked"), sentinel_version());
    }

    #[test]
    fn test_leading_token_extracts_prefix() {
        assert_eq!(leading_version_token("14.3 Beta 2"), Some("14.3"));
        assert_eq!(leading_version_token("13.0.1"), Some("13.0.1"));
    }

    #[test]
    fn test_leading_token_anchored_at_start() {
        assert_eq!(leading_version_token("macOS 14.3"), None);
    }

    #[test]
    fn test_sentinel_sorts_below_all_real_versions() {
        let real = parse_or_sentinel("0.0.1");
        assert!(sentinel_version() < real);
    }
}
