use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Couldn't write to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("No version matching '{spec}' found")]
    NoMatch { spec: String },
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Couldn't list available versions: {0}")]
    RemoteUnavailable(#[source] TransportError),

    #[error("Reading the version directory {} failed: {source}", .path.display())]
    StoreUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Couldn't create the version store at {}: {source}", .path.display())]
    StoreLayout {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    NoMatch(#[from] MatchError),

    #[error("Couldn't fetch {version}: {source}{}", cleanup_suffix(.cleanup))]
    FetchFailed {
        version: String,
        #[source]
        source: TransportError,
        cleanup: Option<io::Error>,
    },

    #[error("No global version set ({} not found)", .path.display())]
    NoGlobalVersion { path: PathBuf },

    #[error("No local version set")]
    NoLocalVersion,

    #[error("Couldn't decide which version to use. Please set a version")]
    NoActiveVersion,

    #[error("Invalid version id '{0}'")]
    InvalidVersion(String),

    #[error("Couldn't activate version {version} ({}: {source})", .path.display())]
    ActivationFailed {
        version: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No arguments set for version {version}")]
    ArgsNotSet { version: String },

    #[error("Couldn't read version marker {}: {source}", .path.display())]
    MarkerUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Couldn't run {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{message} ({}): {source}", .path.display())]
    Io {
        message: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ManagerError {
    /// True for outcomes that mean "nothing configured" rather than a failure
    pub fn is_not_set(&self) -> bool {
        matches!(
            self,
            ManagerError::NoLocalVersion
                | ManagerError::NoGlobalVersion { .. }
                | ManagerError::NoActiveVersion
                | ManagerError::ArgsNotSet { .. }
        )
    }
}

fn cleanup_suffix(cleanup: &Option<io::Error>) -> String {
    match cleanup {
        Some(e) => format!(". Couldn't clean after error: {}", e),
        None => String::new(),
    }
}
