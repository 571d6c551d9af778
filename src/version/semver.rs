use semver::Version;

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// Handles partial versions like "1" or "1.2" by padding with zeros.
/// Does NOT strip 'v' prefix (use `normalize_version` first if needed).
///
/// Examples:
/// - "1" -> Version(1, 0, 0)
/// - "1.2" -> Version(1, 2, 0)
/// - "1.2.3" -> Version(1, 2, 3)
pub fn parse_version(version: &str) -> Option<Version> {
    let parts: Vec<&str> = version.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => version.to_string(),
    };
    Version::parse(&normalized).ok()
}

/// Normalize a user- or file-supplied version string.
///
/// Trims surrounding whitespace (marker files usually end with a newline)
/// and a single leading `v`.
pub fn normalize_version(version: &str) -> String {
    let trimmed = version.trim();
    trimmed.strip_prefix('v').unwrap_or(trimmed).trim().to_string()
}

/// Turn a remote index entry such as `"v4.1.0x"` into a VersionId (`"4.1.0"`).
///
/// Any trailing non-digit suffix is dropped. Returns None when nothing
/// version-like remains.
pub fn strip_index_suffix(raw: &str) -> Option<String> {
    let normalized = normalize_version(raw);
    let stripped = normalized.trim_end_matches(|c: char| !c.is_ascii_digit());
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Ordering key for a VersionId.
///
/// Unparseable versions sort before every parseable one and are ordered
/// among themselves by their raw text, so sorting is total and stable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionKey {
    parsed: Option<Version>,
    raw: String,
}

impl VersionKey {
    pub fn new(version: &str) -> Self {
        let normalized = normalize_version(version);
        Self {
            parsed: parse_version(&normalized),
            raw: normalized,
        }
    }

    pub fn version(&self) -> Option<&Version> {
        self.parsed.as_ref()
    }
}
