//! Active version sources: local marker, global marker and environment
//!
//! Each source is read independently. Choosing between them is left to the
//! caller; see [`crate::precedence`] for the default policy.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::version::error::ManagerError;
use crate::version::manager::VersionManager;
use crate::version::semver::normalize_version;

/// A version found in a local marker file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVersion {
    pub version: String,
    /// Marker file the version was read from
    pub path: PathBuf,
}

/// Read a marker file; Ok(None) when it does not exist or is empty
async fn read_marker(path: &Path) -> Result<Option<String>, ManagerError> {
    match fs::read_to_string(path).await {
        Ok(contents) => {
            let version = normalize_version(&contents);
            Ok((!version.is_empty()).then_some(version))
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::IsADirectory) => {
            Ok(None)
        }
        Err(source) => Err(ManagerError::MarkerUnreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl VersionManager {
    /// Local version for the current working directory
    pub async fn get_local(&self) -> Result<Option<LocalVersion>, ManagerError> {
        let cwd = Self::current_dir()?;
        self.get_local_from(&cwd).await
    }

    /// Search `start` and then each ancestor for a marker file
    ///
    /// Returns Ok(None) once the filesystem root has been checked without a hit.
    pub async fn get_local_from(&self, start: &Path) -> Result<Option<LocalVersion>, ManagerError> {
        for dir in start.ancestors() {
            let path = self.store().local_marker_path(dir);
            if let Some(version) = read_marker(&path).await? {
                debug!("Local version {} from {}", version, path.display());
                return Ok(Some(LocalVersion { version, path }));
            }
        }

        debug!("No local version above {}", start.display());
        Ok(None)
    }

    /// Version recorded in the store root's marker file
    pub async fn get_global(&self) -> Result<String, ManagerError> {
        let path = self.store().global_marker_path();
        read_marker(&path)
            .await?
            .ok_or(ManagerError::NoGlobalVersion { path })
    }

    /// Environment override supplied at construction time
    pub fn get_env(&self) -> Option<String> {
        self.env_version()
            .map(normalize_version)
            .filter(|v| !v.is_empty())
    }

    /// Install `version` and record it as the global version
    pub async fn set_global(&self, version: &str) -> Result<PathBuf, ManagerError> {
        self.install(version).await?;
        let path = self.store().global_marker_path();
        self.write_marker(version, path).await
    }

    /// Install `version` and record it as the local version of the working directory
    pub async fn set_local(&self, version: &str) -> Result<PathBuf, ManagerError> {
        let cwd = Self::current_dir()?;
        self.set_local_in(&cwd, version).await
    }

    /// Install `version` and record it as the local version of `dir`
    pub async fn set_local_in(&self, dir: &Path, version: &str) -> Result<PathBuf, ManagerError> {
        self.install(version).await?;
        let path = self.store().local_marker_path(dir);
        self.write_marker(version, path).await
    }

    async fn write_marker(&self, version: &str, path: PathBuf) -> Result<PathBuf, ManagerError> {
        match fs::write(&path, version).await {
            Ok(()) => {
                debug!("Activated {} in {}", version, path.display());
                Ok(path)
            }
            Err(source) => Err(ManagerError::ActivationFailed {
                version: version.to_string(),
                path,
                source,
            }),
        }
    }
}
