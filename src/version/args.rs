//! Extra arguments stored per installed version

use std::io;

use tokio::fs;
use tracing::debug;

use crate::version::error::ManagerError;
use crate::version::manager::{VersionManager, validate_version_id};

/// Split a stored argument string into individual arguments
pub fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

impl VersionManager {
    /// Install `version` and store `args` in its directory
    pub async fn set_args_for_version(&self, version: &str, args: &str) -> Result<(), ManagerError> {
        self.install(version).await?;

        let path = self.store().args_path(version);
        fs::write(&path, args)
            .await
            .map_err(|source| ManagerError::Io {
                message: format!("Couldn't write args for version {}", version),
                path: path.clone(),
                source,
            })?;

        debug!("Stored args for {}: {}", version, args);
        Ok(())
    }

    /// Stored arguments for `version`, trimmed
    ///
    /// `ArgsNotSet` means no argument file exists; callers usually treat that
    /// as "no extra arguments".
    pub async fn get_args_for_version(&self, version: &str) -> Result<String, ManagerError> {
        validate_version_id(version)?;

        let path = self.store().args_path(version);
        match fs::read_to_string(&path).await {
            Ok(args) => Ok(args.trim().to_string()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ManagerError::ArgsNotSet {
                version: version.to_string(),
            }),
            Err(source) => Err(ManagerError::Io {
                message: format!("Couldn't read args for version {}", version),
                path,
                source,
            }),
        }
    }
}
