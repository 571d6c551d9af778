//! Version ordering and specifier matching abstraction

use crate::version::error::MatchError;
use crate::version::semver::VersionKey;

/// Trait for turning a user-supplied version specifier into a concrete version
///
/// Implementations define both the ordering used for the available and
/// installed lists and the rules by which a specifier selects from them:
/// - exact: `4.1.0` or `v4.1.0` selects exactly that version
/// - partial: `4` or `4.1` selects the highest `4.x.x` / `4.1.x`
/// - symbolic: `latest` selects the highest version in the list
pub trait VersionMatcher: Send + Sync {
    /// Key used to sort version lists ascending
    fn ordering_key(&self, version: &str) -> VersionKey {
        VersionKey::new(version)
    }

    /// Find the version in `versions` that best satisfies `spec`
    ///
    /// `versions` is expected to be sorted ascending by `ordering_key`.
    fn find(&self, spec: &str, versions: &[String]) -> Result<String, MatchError>;
}
