//! Version lifecycle: listing, resolution, install and removal
//!
//! The manager owns the available/installed caches and delegates to three
//! collaborators: a [`Transport`] for the remote index and binaries, a
//! [`VersionMatcher`] for ordering and specifier matching, and a
//! [`ProcessRunner`] for running installed builds.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use indexmap::IndexSet;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::version::cache::ListCache;
use crate::version::error::{ManagerError, TransportError};
use crate::version::matcher::VersionMatcher;
use crate::version::matchers::DistVersionMatcher;
use crate::version::runner::{ProcessRunner, SystemRunner};
use crate::version::semver::strip_index_suffix;
use crate::version::store::VersionStore;
use crate::version::transport::{Arch, Transport, binary_url, index_url};
use crate::version::transports::HttpTransport;

/// How a version was satisfied by `install_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    AlreadyInstalled,
    Installed,
}

/// Completion of one version in a batch install
#[derive(Debug)]
pub struct InstallReport {
    pub version: String,
    pub outcome: Result<InstallStatus, ManagerError>,
}

pub struct VersionManager {
    source_url: String,
    store: VersionStore,
    env_version: Option<String>,
    jobs: usize,
    transport: Arc<dyn Transport>,
    matcher: Arc<dyn VersionMatcher>,
    runner: Arc<dyn ProcessRunner>,
    available: ListCache,
    installed: ListCache,
}

impl VersionManager {
    /// Create a manager talking HTTP to `config.source_url`
    pub fn new(config: &Config) -> Result<Self, ManagerError> {
        let transport = HttpTransport::new(config.proxy.as_deref())
            .map_err(|e| ManagerError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Self::build(
            config,
            Arc::new(transport),
            Arc::new(DistVersionMatcher),
            Arc::new(SystemRunner),
        )
    }

    /// Build a manager with custom collaborators
    ///
    /// Creates the versions directory under `config.store_root` if missing.
    pub fn build(
        config: &Config,
        transport: Arc<dyn Transport>,
        matcher: Arc<dyn VersionMatcher>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self, ManagerError> {
        let store = VersionStore::new(
            &config.store_root,
            Arch::from_want_x64(config.want_x64),
            &config.executable,
            &config.marker_file,
        );

        store
            .ensure_layout()
            .map_err(|source| ManagerError::StoreLayout {
                path: store.versions_dir(),
                source,
            })?;

        let ttl = config.cache_ttl();
        Ok(Self {
            source_url: config.source_url.clone(),
            store,
            env_version: config.env_version.clone(),
            jobs: config.jobs.max(1),
            transport,
            matcher,
            runner,
            available: ListCache::new("available", ttl),
            installed: ListCache::new("installed", ttl),
        })
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub(crate) fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    pub(crate) fn env_version(&self) -> Option<&str> {
        self.env_version.as_deref()
    }

    pub fn want_x64(&self) -> bool {
        self.store.arch() == Arch::X64
    }

    /// Switch between 64-bit and 32-bit builds
    ///
    /// Installed builds live in a per-arch directory, so the installed cache
    /// is dropped.
    pub fn set_want_x64(&mut self, want_x64: bool) -> Result<(), ManagerError> {
        let arch = Arch::from_want_x64(want_x64);
        if arch == self.store.arch() {
            return Ok(());
        }

        self.store.set_arch(arch);
        self.installed.invalidate();
        self.store
            .ensure_layout()
            .map_err(|source| ManagerError::StoreLayout {
                path: self.store.versions_dir(),
                source,
            })
    }

    /// Drop both cached lists; the next listing goes back to the source
    pub fn invalidate_caches(&self) {
        self.available.invalidate();
        self.installed.invalidate();
    }

    /// Sort ascending by the matcher's ordering key, keeping the first of any duplicates
    fn sort_unique(&self, versions: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut versions: Vec<String> = versions.into_iter().collect();
        versions.sort_by_cached_key(|v| self.matcher.ordering_key(v));
        versions
            .into_iter()
            .collect::<IndexSet<String>>()
            .into_iter()
            .collect()
    }

    /// All versions published on the remote, ascending
    pub async fn list_available(&self) -> Result<Vec<String>, ManagerError> {
        if let Some(versions) = self.available.get() {
            return Ok(versions);
        }

        let url = index_url(&self.source_url);
        debug!("Fetching version index from {}", url);

        let entries = self
            .transport
            .fetch_index(&url)
            .await
            .map_err(ManagerError::RemoteUnavailable)?;

        let versions =
            self.sort_unique(entries.iter().filter_map(|e| strip_index_suffix(&e.version)));
        info!("Found {} available versions", versions.len());

        self.available.store(versions.clone());
        Ok(versions)
    }

    /// All versions present in the store for the current arch, ascending
    pub async fn list_installed(&self) -> Result<Vec<String>, ManagerError> {
        if let Some(versions) = self.installed.get() {
            return Ok(versions);
        }

        let dir = self.store.versions_dir();
        let unreadable = |source: io::Error| ManagerError::StoreUnreadable {
            path: dir.clone(),
            source,
        };

        let mut entries = fs::read_dir(&dir).await.map_err(unreadable)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }

        let versions = self.sort_unique(names);
        debug!("Found {} installed versions", versions.len());

        self.installed.store(versions.clone());
        Ok(versions)
    }

    /// Resolve a user specifier to a concrete version
    ///
    /// Matches against the available list; when the remote is unreachable,
    /// falls back to the installed list so offline use keeps working.
    pub async fn resolve_version(&self, spec: &str) -> Result<String, ManagerError> {
        let versions = match self.list_available().await {
            Ok(versions) => versions,
            Err(ManagerError::RemoteUnavailable(e)) => {
                warn!("{}; resolving '{}' against installed versions", e, spec);
                self.list_installed().await?
            }
            Err(e) => return Err(e),
        };

        Ok(self.matcher.find(spec, &versions)?)
    }

    /// Resolve a user specifier against installed versions only
    pub async fn resolve_installed(&self, spec: &str) -> Result<String, ManagerError> {
        let versions = self.list_installed().await?;
        Ok(self.matcher.find(spec, &versions)?)
    }

    /// Make sure `version` is on disk, downloading it only if missing
    pub async fn install(&self, version: &str) -> Result<String, ManagerError> {
        validate_version_id(version)?;

        let installed = self.list_installed().await?;
        if installed.iter().any(|v| v == version) {
            debug!("{} is already installed", version);
            return Ok(version.to_string());
        }

        self.fetch(version).await
    }

    /// Download `version` into the store
    ///
    /// On any failure the version directory is removed before the error is
    /// returned, so a partially downloaded build is never seen as installed.
    pub async fn fetch(&self, version: &str) -> Result<String, ManagerError> {
        validate_version_id(version)?;

        let url = binary_url(
            &self.source_url,
            version,
            self.store.arch(),
            self.store.executable(),
        );
        let target = self.store.exe_path(version);
        info!("Fetching {} from {}", version, url);

        let result: Result<u64, TransportError> = async {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| TransportError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            self.transport.download(&url, &target).await
        }
        .await;

        match result {
            Ok(bytes) => {
                info!("Installed {} ({} bytes)", version, bytes);
                self.installed
                    .insert_sorted(version, |v| self.matcher.ordering_key(v));
                Ok(version.to_string())
            }
            Err(source) => {
                error!("Failed to fetch {}: {}", version, source);
                let cleanup = remove_dir_if_exists(&self.store.version_dir(version))
                    .await
                    .err();
                if let Some(e) = &cleanup {
                    error!("Failed to clean up after fetching {}: {}", version, e);
                }
                self.installed.remove(version);
                Err(ManagerError::FetchFailed {
                    version: version.to_string(),
                    source,
                    cleanup,
                })
            }
        }
    }

    /// Install every available version that is not installed yet
    ///
    /// See [`install_all_with`](Self::install_all_with) for ordering.
    pub async fn install_all(&self) -> Result<Vec<InstallReport>, ManagerError> {
        let mut reports = Vec::new();
        self.install_all_with(|report| reports.push(report)).await?;
        Ok(reports)
    }

    /// Install every available version, reporting each completion to `on_complete`
    ///
    /// At most `jobs` downloads run at once. Reports are delivered in request
    /// order (ascending version order) whatever order the downloads finish in.
    /// A failed version is reported and does not stop the others.
    pub async fn install_all_with<F>(&self, mut on_complete: F) -> Result<(), ManagerError>
    where
        F: FnMut(InstallReport),
    {
        let installed = self.list_installed().await?;
        let available = self.list_available().await?;
        info!(
            "Installing {} available versions with {} parallel downloads",
            available.len(),
            self.jobs
        );

        let mut completions = stream::iter(available)
            .map(|version| {
                let already_installed = installed.contains(&version);
                async move {
                    let outcome = if already_installed {
                        Ok(InstallStatus::AlreadyInstalled)
                    } else {
                        self.fetch(&version).await.map(|_| InstallStatus::Installed)
                    };
                    InstallReport { version, outcome }
                }
            })
            .buffered(self.jobs);

        while let Some(report) = completions.next().await {
            on_complete(report);
        }

        Ok(())
    }

    /// Delete an installed version; removing a missing version is not an error
    pub async fn remove(&self, version: &str) -> Result<(), ManagerError> {
        validate_version_id(version)?;

        let dir = self.store.version_dir(version);
        remove_dir_if_exists(&dir)
            .await
            .map_err(|source| ManagerError::Io {
                message: format!("Failed to remove version {}", version),
                path: dir.clone(),
                source,
            })?;

        self.installed.remove(version);
        info!("Removed {}", version);
        Ok(())
    }

    pub(crate) fn current_dir() -> Result<PathBuf, ManagerError> {
        std::env::current_dir().map_err(|source| ManagerError::Io {
            message: "Failed to determine current directory".to_string(),
            path: PathBuf::from("."),
            source,
        })
    }
}

/// Reject ids that would escape the versions directory
pub(crate) fn validate_version_id(version: &str) -> Result<(), ManagerError> {
    let invalid = version.is_empty()
        || version == "."
        || version == ".."
        || version.contains(['/', '\\']);
    if invalid {
        Err(ManagerError::InvalidVersion(version.to_string()))
    } else {
        Ok(())
    }
}

async fn remove_dir_if_exists(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::runner::MockProcessRunner;
    use crate::version::transport::{IndexEntry, MockTransport};
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const SOURCE: &str = "http://dist.test";

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            source_url: SOURCE.to_string(),
            store_root: temp_dir.path().to_path_buf(),
            want_x64: true,
            ..Default::default()
        }
    }

    fn create_manager(temp_dir: &TempDir, transport: MockTransport) -> VersionManager {
        VersionManager::build(
            &test_config(temp_dir),
            Arc::new(transport),
            Arc::new(DistVersionMatcher),
            Arc::new(MockProcessRunner::new()),
        )
        .unwrap()
    }

    fn index(versions: &[&str]) -> Vec<IndexEntry> {
        versions.iter().map(|v| IndexEntry::new(v)).collect()
    }

    fn install_dir(temp_dir: &TempDir, version: &str) {
        std::fs::create_dir_all(temp_dir.path().join("v-x64").join(version)).unwrap();
    }

    #[tokio::test]
    async fn list_available_strips_suffix_dedups_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport
            .expect_fetch_index()
            .with(eq("http://dist.test/index.json"))
            .times(1)
            .returning(|_| Ok(index(&["4.1.0x", "4.1.0x", "4.0.0x"])));

        let manager = create_manager(&temp_dir, transport);

        let versions = manager.list_available().await.unwrap();
        assert_eq!(versions, vec!["4.0.0", "4.1.0"]);

        // Served from cache: the mock allows only one fetch
        let versions = manager.list_available().await.unwrap();
        assert_eq!(versions, vec!["4.0.0", "4.1.0"]);
    }

    #[tokio::test]
    async fn list_available_leaves_cache_empty_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        transport.expect_fetch_index().times(2).returning(move |url| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TransportError::Status {
                    url: url.to_string(),
                    status: 500,
                })
            } else {
                Ok(index(&["1.0.0x"]))
            }
        });

        let manager = create_manager(&temp_dir, transport);

        let first = manager.list_available().await;
        assert!(matches!(first, Err(ManagerError::RemoteUnavailable(_))));

        let second = manager.list_available().await.unwrap();
        assert_eq!(second, vec!["1.0.0"]);
    }

    #[tokio::test]
    async fn list_installed_lists_only_directories_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir, MockTransport::new());
        install_dir(&temp_dir, "10.0.0");
        install_dir(&temp_dir, "2.0.0");
        std::fs::write(temp_dir.path().join("v-x64").join("stray.txt"), "x").unwrap();

        let versions = manager.list_installed().await.unwrap();

        assert_eq!(versions, vec!["2.0.0", "10.0.0"]);
    }

    #[tokio::test]
    async fn list_installed_is_cached_until_invalidated() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir, MockTransport::new());
        install_dir(&temp_dir, "1.0.0");
        assert_eq!(manager.list_installed().await.unwrap(), vec!["1.0.0"]);

        install_dir(&temp_dir, "2.0.0");
        assert_eq!(manager.list_installed().await.unwrap(), vec!["1.0.0"]);

        manager.invalidate_caches();
        assert_eq!(
            manager.list_installed().await.unwrap(),
            vec!["1.0.0", "2.0.0"]
        );
    }

    #[tokio::test]
    async fn list_installed_reports_unreadable_store() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir, MockTransport::new());
        std::fs::remove_dir_all(temp_dir.path().join("v-x64")).unwrap();

        let result = manager.list_installed().await;

        assert!(matches!(result, Err(ManagerError::StoreUnreadable { .. })));
    }

    #[tokio::test]
    async fn resolve_version_matches_against_available() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport
            .expect_fetch_index()
            .returning(|_| Ok(index(&["3.3.1x", "4.0.0x", "4.1.0x"])));

        let manager = create_manager(&temp_dir, transport);

        assert_eq!(manager.resolve_version("4").await.unwrap(), "4.1.0");
        assert_eq!(manager.resolve_version("3").await.unwrap(), "3.3.1");
        assert!(matches!(
            manager.resolve_version("7").await,
            Err(ManagerError::NoMatch(_))
        ));
    }

    #[tokio::test]
    async fn resolve_version_falls_back_to_installed_when_offline() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport.expect_fetch_index().returning(|url| {
            Err(TransportError::Status {
                url: url.to_string(),
                status: 502,
            })
        });

        let manager = create_manager(&temp_dir, transport);
        install_dir(&temp_dir, "2.5.0");
        install_dir(&temp_dir, "3.0.0");

        assert_eq!(manager.resolve_version("latest").await.unwrap(), "3.0.0");
        assert!(matches!(
            manager.resolve_version("4").await,
            Err(ManagerError::NoMatch(_))
        ));
    }

    #[tokio::test]
    async fn resolve_installed_ignores_remote_versions() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport.expect_fetch_index().times(0);

        let manager = create_manager(&temp_dir, transport);
        install_dir(&temp_dir, "3.0.0");
        install_dir(&temp_dir, "3.3.1");

        assert_eq!(manager.resolve_installed("3").await.unwrap(), "3.3.1");
        assert!(matches!(
            manager.resolve_installed("4").await,
            Err(ManagerError::NoMatch(_))
        ));
    }

    #[test]
    fn build_reports_unusable_store_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        let config = Config {
            store_root: file,
            ..test_config(&temp_dir)
        };

        let result = VersionManager::build(
            &config,
            Arc::new(MockTransport::new()),
            Arc::new(DistVersionMatcher),
            Arc::new(MockProcessRunner::new()),
        );

        assert!(matches!(result, Err(ManagerError::StoreLayout { .. })));
    }

    #[tokio::test]
    async fn install_skips_download_for_installed_version() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport.expect_download().times(0);
        transport.expect_fetch_index().times(0);

        let manager = create_manager(&temp_dir, transport);
        install_dir(&temp_dir, "4.1.0");

        assert_eq!(manager.install("4.1.0").await.unwrap(), "4.1.0");
    }

    #[tokio::test]
    async fn install_twice_downloads_once() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport
            .expect_download()
            .withf(|url, _| url == "http://dist.test/v4.1.0/win-x64/iojs.exe")
            .times(1)
            .returning(|_, dest| {
                std::fs::write(dest, b"MZ").unwrap();
                Ok(2)
            });

        let manager = create_manager(&temp_dir, transport);

        manager.install("4.1.0").await.unwrap();
        manager.install("4.1.0").await.unwrap();

        assert!(temp_dir.path().join("v-x64/4.1.0/iojs.exe").is_file());
        assert_eq!(manager.list_installed().await.unwrap(), vec!["4.1.0"]);
    }

    #[tokio::test]
    async fn fetch_failure_removes_partial_version_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport.expect_download().times(1).returning(|url, dest| {
            std::fs::write(dest, b"partial").unwrap();
            Err(TransportError::Status {
                url: url.to_string(),
                status: 500,
            })
        });

        let manager = create_manager(&temp_dir, transport);

        let result = manager.fetch("5.0.0").await;

        match result {
            Err(ManagerError::FetchFailed {
                version, cleanup, ..
            }) => {
                assert_eq!(version, "5.0.0");
                assert!(cleanup.is_none());
            }
            other => panic!("expected FetchFailed, got {:?}", other),
        }
        assert!(!temp_dir.path().join("v-x64/5.0.0").exists());
        manager.invalidate_caches();
        assert!(manager.list_installed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_refetch_drops_version_from_installed_cache() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        let downloads = Arc::new(AtomicUsize::new(0));
        let counter = downloads.clone();
        transport.expect_download().times(2).returning(move |_, dest| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                std::fs::write(dest, b"MZ-part").unwrap();
                Err(TransportError::InvalidResponse("truncated body".to_string()))
            } else {
                std::fs::write(dest, b"MZ").unwrap();
                Ok(2)
            }
        });

        let manager = create_manager(&temp_dir, transport);
        install_dir(&temp_dir, "4.1.0");
        assert_eq!(manager.list_installed().await.unwrap(), vec!["4.1.0"]);

        let result = manager.fetch("4.1.0").await;

        assert!(matches!(result, Err(ManagerError::FetchFailed { .. })));
        assert!(!temp_dir.path().join("v-x64/4.1.0").exists());
        assert!(manager.list_installed().await.unwrap().is_empty());

        manager.install("4.1.0").await.unwrap();
        assert_eq!(downloads.load(Ordering::SeqCst), 2);
        assert!(temp_dir.path().join("v-x64/4.1.0/iojs.exe").is_file());
    }

    #[tokio::test]
    async fn fetch_uses_32bit_url_when_x64_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport
            .expect_download()
            .withf(|url, dest| {
                url == "http://dist.test/v3.0.0/win-x86/iojs.exe"
                    && dest.ends_with("v/3.0.0/iojs.exe")
            })
            .times(1)
            .returning(|_, _| Ok(0));

        let mut manager = create_manager(&temp_dir, transport);
        manager.set_want_x64(false).unwrap();

        manager.fetch("3.0.0").await.unwrap();
        assert!(!manager.want_x64());
    }

    #[rstest::rstest]
    #[case("")]
    #[case("..")]
    #[case("../evil")]
    #[case("4.0.0\\x")]
    #[tokio::test]
    async fn install_rejects_path_like_ids(#[case] version: &str) {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir, MockTransport::new());

        let result = manager.install(version).await;

        assert!(matches!(result, Err(ManagerError::InvalidVersion(_))));
    }

    #[tokio::test]
    async fn install_all_reports_each_version_in_order_and_continues_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut transport = MockTransport::new();
        transport
            .expect_fetch_index()
            .returning(|_| Ok(index(&["3.0.0x", "1.0.0x", "2.0.0x"])));
        transport.expect_download().times(2).returning(|url, dest| {
            if url.contains("v2.0.0") {
                Err(TransportError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            } else {
                std::fs::write(dest, b"MZ").unwrap();
                Ok(2)
            }
        });

        let manager = create_manager(&temp_dir, transport);
        install_dir(&temp_dir, "1.0.0");

        let reports = manager.install_all().await.unwrap();

        let versions: Vec<&str> = reports.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["1.0.0", "2.0.0", "3.0.0"]);
        assert!(matches!(
            reports[0].outcome,
            Ok(InstallStatus::AlreadyInstalled)
        ));
        assert!(matches!(
            reports[1].outcome,
            Err(ManagerError::FetchFailed { .. })
        ));
        assert!(matches!(reports[2].outcome, Ok(InstallStatus::Installed)));
        assert!(!temp_dir.path().join("v-x64/2.0.0").exists());
    }

    #[tokio::test]
    async fn remove_deletes_directory_and_tolerates_missing() {
        let temp_dir = TempDir::new().unwrap();
        let manager = create_manager(&temp_dir, MockTransport::new());
        install_dir(&temp_dir, "4.0.0");
        assert_eq!(manager.list_installed().await.unwrap(), vec!["4.0.0"]);

        manager.remove("4.0.0").await.unwrap();
        manager.remove("9.9.9").await.unwrap();

        assert!(!temp_dir.path().join("v-x64/4.0.0").exists());
        assert!(manager.list_installed().await.unwrap().is_empty());
    }
}
