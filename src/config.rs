use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Defaults
// =============================================================================

/// Default distribution server
pub const DEFAULT_SOURCE_URL: &str = "https://iojs.org/dist";

/// Executable stored in every version directory
pub const DEFAULT_EXECUTABLE: &str = "iojs.exe";

/// Name of the global and local version marker files
pub const DEFAULT_MARKER_FILE: &str = ".iojs-version";

/// Maximum number of concurrent downloads during `install --all`
pub const DEFAULT_JOBS: usize = 4;

/// Name of the optional settings file inside the store root
pub const CONFIG_FILE: &str = "config.json";

/// Name of the log file inside the store root
pub const LOG_FILE: &str = "runvm.log";

/// Environment variables read by `Config::load`
pub const ENV_PREFIX: &str = "RUNVM_PREFIX";
pub const ENV_SOURCE_URL: &str = "RUNVM_SOURCE_URL";
pub const ENV_PROXY: &str = "RUNVM_PROXY";
pub const ENV_X64: &str = "RUNVM_X64";
pub const ENV_VERSION: &str = "RUNVM_VERSION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Manager configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Base URL serving `index.json` and release binaries
    pub source_url: String,
    /// Local install root
    pub store_root: PathBuf,
    /// Proxy forwarded verbatim to the transport
    pub proxy: Option<String>,
    /// Select 64-bit builds instead of 32-bit ones
    pub want_x64: bool,
    /// Pre-resolved environment override
    pub env_version: Option<String>,
    /// Lifetime of the available/installed caches; None keeps them for the process lifetime
    pub cache_ttl_ms: Option<u64>,
    pub jobs: usize,
    pub executable: String,
    pub marker_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            store_root: data_dir(),
            proxy: None,
            want_x64: host_is_64bit(),
            env_version: None,
            cache_ttl_ms: None,
            jobs: DEFAULT_JOBS,
            executable: DEFAULT_EXECUTABLE.to_string(),
            marker_file: DEFAULT_MARKER_FILE.to_string(),
        }
    }
}

/// Values taken from the process environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub prefix: Option<String>,
    pub source_url: Option<String>,
    pub proxy: Option<String>,
    pub x64: Option<String>,
    pub version: Option<String>,
}

impl EnvOverrides {
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            prefix: var(ENV_PREFIX),
            source_url: var(ENV_SOURCE_URL),
            proxy: var(ENV_PROXY),
            x64: var(ENV_X64),
            version: var(ENV_VERSION),
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let env = EnvOverrides::from_process();
        let root = env
            .prefix
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(data_dir);
        Self::load_from(&root.join(CONFIG_FILE), env)
    }

    /// Load `path` (a missing file means defaults) and apply `env` on top
    pub fn load_from(path: &Path, env: EnvOverrides) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Ok(config.with_env(env))
    }

    /// Apply environment overrides; environment wins over file values
    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        if let Some(prefix) = env.prefix {
            self.store_root = PathBuf::from(prefix);
        }
        if let Some(source_url) = env.source_url {
            self.source_url = source_url;
        }
        if env.proxy.is_some() {
            self.proxy = env.proxy;
        }
        if let Some(x64) = env.x64 {
            self.want_x64 = x64.trim() == "1";
        }
        if env.version.is_some() {
            self.env_version = env.version;
        }
        self
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_ms.map(Duration::from_millis)
    }

    /// Log file, kept next to the installed versions
    pub fn log_path(&self) -> PathBuf {
        self.store_root.join(LOG_FILE)
    }
}

fn host_is_64bit() -> bool {
    cfg!(target_pointer_width = "64")
}

/// Returns the path to the data directory for runvm.
/// Uses $XDG_DATA_HOME/runvm if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/runvm,
/// or ./runvm if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("runvm")
}
