//! Version matcher for runtime distribution releases
//!
//! Supports the specifiers users type when picking a runtime build:
//! - `4.1.0`, `v4.1.0`, `=4.1.0` - exactly that release
//! - `4`, `4.1`, `4.x`, `4.1.x`, `4.*` - highest release in that line
//! - `latest`, `stable`, `*` - highest release overall
//! - `^4.1.0`, `~4.1.0`, `>=4.0.0`, `>4.0.0`, `<=5.0.0`, `<5.0.0` - ranges
//! - `>=4.0.0, <5.0.0` - comma-separated requirements must all hold

use semver::Version;

use crate::version::error::MatchError;
use crate::version::matcher::VersionMatcher;
use crate::version::semver::{VersionKey, normalize_version, parse_version};

/// Symbolic specifiers that select the highest available release
const LATEST_ALIASES: &[&str] = &["latest", "stable", "current", "*", "x"];

pub struct DistVersionMatcher;

/// Represents a single parsed requirement
#[derive(Debug, PartialEq)]
enum VersionRequirement {
    /// Exactly this release
    Exact(Version),
    /// Caret: ^1.2.3 means >=1.2.3 <2.0.0 (special handling for 0.x)
    Caret(Version),
    /// Tilde: ~1.2.3 means >=1.2.3 <1.3.0
    Tilde(Version),
    Gte(Version),
    Gt(Version),
    Lte(Version),
    Lt(Version),
    /// Any release
    Any,
    /// Partial major: 4 or 4.x means the 4 line
    Major(u64),
    /// Partial minor: 4.1 or 4.1.x means the 4.1 line
    Minor(u64, u64),
}

impl VersionRequirement {
    /// Parse a single requirement (not comma-separated)
    fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();

        if LATEST_ALIASES.contains(&spec.to_ascii_lowercase().as_str()) {
            Some(VersionRequirement::Any)
        } else if let Some(rest) = spec.strip_prefix(">=") {
            Self::parse_bound(rest).map(VersionRequirement::Gte)
        } else if let Some(rest) = spec.strip_prefix('>') {
            Self::parse_bound(rest).map(VersionRequirement::Gt)
        } else if let Some(rest) = spec.strip_prefix("<=") {
            Self::parse_bound(rest).map(VersionRequirement::Lte)
        } else if let Some(rest) = spec.strip_prefix('<') {
            Self::parse_bound(rest).map(VersionRequirement::Lt)
        } else if let Some(rest) = spec.strip_prefix('=') {
            Self::parse_bound(rest).map(VersionRequirement::Exact)
        } else if let Some(rest) = spec.strip_prefix('^') {
            Self::parse_bound(rest).map(VersionRequirement::Caret)
        } else if let Some(rest) = spec.strip_prefix('~') {
            Self::parse_bound(rest).map(VersionRequirement::Tilde)
        } else {
            Self::parse_plain(&normalize_version(spec))
        }
    }

    fn parse_bound(rest: &str) -> Option<Version> {
        parse_version(&normalize_version(rest))
    }

    /// Parse a requirement without an operator: exact or partial
    fn parse_plain(spec: &str) -> Option<Self> {
        let parts: Vec<&str> = spec.split('.').collect();

        match parts.as_slice() {
            [major] | [major, "x" | "*"] => major.parse().ok().map(VersionRequirement::Major),
            [major, minor] | [major, minor, "x" | "*"] => {
                let major = major.parse().ok()?;
                let minor = minor.parse().ok()?;
                Some(VersionRequirement::Minor(major, minor))
            }
            _ => Version::parse(spec).ok().map(VersionRequirement::Exact),
        }
    }

    fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionRequirement::Exact(v) => version == v,
            VersionRequirement::Caret(v) => {
                if version < v {
                    return false;
                }
                if v.major == 0 {
                    if v.minor == 0 {
                        version.major == 0 && version.minor == 0 && version.patch == v.patch
                    } else {
                        version.major == 0 && version.minor == v.minor
                    }
                } else {
                    version.major == v.major
                }
            }
            VersionRequirement::Tilde(v) => {
                version >= v && version.major == v.major && version.minor == v.minor
            }
            VersionRequirement::Gte(v) => version >= v,
            VersionRequirement::Gt(v) => version > v,
            VersionRequirement::Lte(v) => version <= v,
            VersionRequirement::Lt(v) => version < v,
            VersionRequirement::Any => version.pre.is_empty(),
            VersionRequirement::Major(major) => version.major == *major && version.pre.is_empty(),
            VersionRequirement::Minor(major, minor) => {
                version.major == *major && version.minor == *minor && version.pre.is_empty()
            }
        }
    }
}

/// All requirements must be satisfied (AND)
#[derive(Debug)]
struct VersionSpec {
    requirements: Vec<VersionRequirement>,
}

impl VersionSpec {
    fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }

        let requirements: Option<Vec<VersionRequirement>> = spec
            .split(',')
            .map(str::trim)
            .map(VersionRequirement::parse)
            .collect();

        requirements.map(|requirements| VersionSpec { requirements })
    }

    fn satisfies(&self, version: &Version) -> bool {
        self.requirements.iter().all(|req| req.satisfies(version))
    }
}

impl VersionMatcher for DistVersionMatcher {
    fn find(&self, spec: &str, versions: &[String]) -> Result<String, MatchError> {
        let no_match = || MatchError::NoMatch {
            spec: spec.to_string(),
        };

        let Some(parsed) = VersionSpec::parse(spec) else {
            // Non-semver ids (e.g. "nightly") can still be selected verbatim
            let wanted = normalize_version(spec);
            return versions
                .iter()
                .find(|v| !wanted.is_empty() && normalize_version(v) == wanted)
                .cloned()
                .ok_or_else(no_match);
        };

        versions
            .iter()
            .filter_map(|v| {
                let key = self.ordering_key(v);
                let matched = key.version().is_some_and(|ver| parsed.satisfies(ver));
                matched.then_some((v, key))
            })
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(v, _)| v.clone())
            .ok_or_else(no_match)
    }
}
