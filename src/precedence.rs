//! Choosing the active version from its independent sources
//!
//! The manager exposes local, global and environment sources separately.
//! This module is the policy that orders them.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::version::active::LocalVersion;
use crate::version::args::split_args;
use crate::version::error::ManagerError;
use crate::version::manager::VersionManager;
use crate::version::runner::ExitOutcome;

/// Where an active version came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// Marker file in the working directory or one of its ancestors
    Local,
    /// Marker file in the store root
    Global,
    /// Override supplied through the environment
    Env,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::Local => "local",
            VersionSource::Global => "global",
            VersionSource::Env => "env",
        }
    }
}

/// Local beats global beats environment
pub const DEFAULT_PRECEDENCE: [VersionSource; 3] =
    [VersionSource::Local, VersionSource::Global, VersionSource::Env];

/// Values read from each source; None means the source is not set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    pub local: Option<LocalVersion>,
    pub global: Option<String>,
    pub env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVersion {
    pub version: String,
    pub source: VersionSource,
    /// Marker file for file-based sources
    pub marker: Option<PathBuf>,
}

/// Pick the first source in `order` that has a value
pub fn select_active(candidates: &Candidates, order: &[VersionSource]) -> Option<ActiveVersion> {
    order.iter().find_map(|source| match source {
        VersionSource::Local => candidates.local.as_ref().map(|local| ActiveVersion {
            version: local.version.clone(),
            source: *source,
            marker: Some(local.path.clone()),
        }),
        VersionSource::Global => candidates.global.as_ref().map(|version| ActiveVersion {
            version: version.clone(),
            source: *source,
            marker: None,
        }),
        VersionSource::Env => candidates.env.as_ref().map(|version| ActiveVersion {
            version: version.clone(),
            source: *source,
            marker: None,
        }),
    })
}

/// Read every source, treating "not set" outcomes as absent
pub async fn gather_candidates(
    manager: &VersionManager,
    start_dir: &Path,
) -> Result<Candidates, ManagerError> {
    let local = manager.get_local_from(start_dir).await?;
    let global = match manager.get_global().await {
        Ok(version) => Some(version),
        Err(e) if e.is_not_set() => None,
        Err(e) => return Err(e),
    };

    Ok(Candidates {
        local,
        global,
        env: manager.get_env(),
    })
}

/// Active version for `start_dir` under `order`
pub async fn resolve_active(
    manager: &VersionManager,
    start_dir: &Path,
    order: &[VersionSource],
) -> Result<Option<ActiveVersion>, ManagerError> {
    let candidates = gather_candidates(manager, start_dir).await?;
    let active = select_active(&candidates, order);
    if let Some(active) = &active {
        debug!(
            "Active version {} from {} source",
            active.version,
            active.source.as_str()
        );
    }
    Ok(active)
}

/// Run the active version for `start_dir` with its stored args followed by `args`
pub async fn run_active(
    manager: &VersionManager,
    start_dir: &Path,
    args: &[String],
) -> Result<ExitOutcome, ManagerError> {
    let active = resolve_active(manager, start_dir, &DEFAULT_PRECEDENCE)
        .await?
        .ok_or(ManagerError::NoActiveVersion)?;

    let mut full_args = match manager.get_args_for_version(&active.version).await {
        Ok(stored) => split_args(&stored),
        Err(e) if e.is_not_set() => Vec::new(),
        Err(e) => return Err(e),
    };
    full_args.extend_from_slice(args);

    manager.emulate(&active.version, &full_args).await
}
