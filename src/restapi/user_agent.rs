//! Provider version for the `User-Agent` header.
//!
//! The version is taken from the first `## [x.y.z]` heading of the
//! `CHANGELOG.md` embedded at build time, parsed once per process. A
//! malformed changelog yields an empty version.

use std::sync::OnceLock;

use tracing::warn;

const CHANGELOG: &str = include_str!("../../CHANGELOG.md");

static PROVIDER_VERSION: OnceLock<String> = OnceLock::new();

/// The provider version, or an empty string when it cannot be determined.
pub fn provider_version() -> &'static str {
    PROVIDER_VERSION.get_or_init(|| match parse_changelog_version(CHANGELOG) {
        Some(version) => version,
        None => {
            warn!("Changelog has no version heading, using empty provider version");
            String::new()
        },
    })
}

/// Value of the `User-Agent` header sent with every request.
pub fn user_agent() -> String {
    provider_version().to_string()
}

/// Extract the version of the first `## [version]` heading.
pub fn parse_changelog_version(content: &str) -> Option<String> {
    let heading = content
        .lines()
        .find(|line| line.trim_start().starts_with("##"))?;
    let start = heading.find('[')? + 1;
    let end = start + heading[start..].find(']')?;
    let version = heading[start..end].trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}
