//! On-disk layout of installed versions
//!
//! ```text
//! <root>/
//! ├── .iojs-version          global marker
//! ├── v/                     32-bit builds
//! │   └── 3.3.1/
//! │       └── iojs.exe
//! └── v-x64/                 64-bit builds
//!     └── 4.1.0/
//!         ├── iojs.exe
//!         └── args           optional extra arguments
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::version::transport::Arch;

/// Name of the per-version argument file
pub const ARGS_FILE: &str = "args";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStore {
    root: PathBuf,
    arch: Arch,
    executable: String,
    marker_file: String,
}

impl VersionStore {
    pub fn new(root: impl Into<PathBuf>, arch: Arch, executable: &str, marker_file: &str) -> Self {
        Self {
            root: root.into(),
            arch,
            executable: executable.to_string(),
            marker_file: marker_file.to_string(),
        }
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn set_arch(&mut self, arch: Arch) {
        self.arch = arch;
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Directory holding one subdirectory per installed version of the current arch
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join(self.arch.store_dir_name())
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    pub fn exe_path(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(&self.executable)
    }

    pub fn args_path(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(ARGS_FILE)
    }

    pub fn global_marker_path(&self) -> PathBuf {
        self.root.join(&self.marker_file)
    }

    /// Marker file path inside `dir`
    pub fn local_marker_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.marker_file)
    }

    /// Create the versions directory if missing
    pub fn ensure_layout(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.versions_dir())
    }
}
