//! Transport test utilities

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use runvm::config::Config;
use runvm::version::error::TransportError;
use runvm::version::manager::VersionManager;
use runvm::version::matchers::DistVersionMatcher;
use runvm::version::runner::SystemRunner;
use runvm::version::transport::{IndexEntry, Transport};

pub const SOURCE_URL: &str = "http://dist.test";

enum Binary {
    Ok(Vec<u8>),
    /// Writes the bytes, then fails as if the connection dropped
    Truncated(Vec<u8>),
}

/// In-memory transport serving a fixed index and fixed binaries
pub struct FakeTransport {
    index: Option<Vec<String>>,
    binaries: HashMap<String, Binary>,
    delays: HashMap<String, Duration>,
    index_requests: AtomicUsize,
    downloads: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            index: None,
            binaries: HashMap::new(),
            delays: HashMap::new(),
            index_requests: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Serve `versions` as the raw `version` fields of index.json
    pub fn with_index(mut self, versions: &[&str]) -> Self {
        self.index = Some(versions.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_binary(mut self, version: &str) -> Self {
        self.binaries
            .insert(version.to_string(), Binary::Ok(b"MZ-runtime".to_vec()));
        self
    }

    pub fn with_truncated_binary(mut self, version: &str) -> Self {
        self.binaries
            .insert(version.to_string(), Binary::Truncated(b"MZ-part".to_vec()));
        self
    }

    pub fn with_delay(mut self, version: &str, delay: Duration) -> Self {
        self.delays.insert(version.to_string(), delay);
        self
    }

    pub fn index_requests(&self) -> usize {
        self.index_requests.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn version_from_url(url: &str) -> Option<String> {
        url.split('/')
            .find_map(|segment| segment.strip_prefix('v'))
            .filter(|v| v.starts_with(|c: char| c.is_ascii_digit()))
            .map(|v| v.to_string())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch_index(&self, url: &str) -> Result<Vec<IndexEntry>, TransportError> {
        self.index_requests.fetch_add(1, Ordering::SeqCst);
        match &self.index {
            Some(versions) => Ok(versions.iter().map(|v| IndexEntry::new(v)).collect()),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 503,
            }),
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let not_found = || TransportError::Status {
            url: url.to_string(),
            status: 404,
        };
        let version = Self::version_from_url(url).ok_or_else(not_found)?;

        if let Some(delay) = self.delays.get(&version) {
            tokio::time::sleep(*delay).await;
        }

        let write = |bytes: &[u8]| {
            std::fs::write(dest, bytes).map_err(|source| TransportError::Write {
                path: dest.to_path_buf(),
                source,
            })
        };

        match self.binaries.get(&version) {
            Some(Binary::Ok(bytes)) => {
                write(bytes)?;
                Ok(bytes.len() as u64)
            }
            Some(Binary::Truncated(bytes)) => {
                write(bytes)?;
                Err(TransportError::InvalidResponse(
                    "connection closed before message completed".to_string(),
                ))
            }
            None => Err(not_found()),
        }
    }
}

/// Build a manager over `transport` with its store in `temp_dir`
pub fn create_test_manager(
    temp_dir: &TempDir,
    transport: Arc<FakeTransport>,
    env_version: Option<&str>,
) -> VersionManager {
    let config = Config {
        source_url: SOURCE_URL.to_string(),
        store_root: temp_dir.path().to_path_buf(),
        want_x64: true,
        env_version: env_version.map(|v| v.to_string()),
        jobs: 2,
        ..Default::default()
    };

    VersionManager::build(
        &config,
        transport,
        Arc::new(DistVersionMatcher),
        Arc::new(SystemRunner),
    )
    .unwrap()
}
