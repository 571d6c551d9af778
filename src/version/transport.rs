//! Transport trait for talking to the remote distribution server

use std::path::Path;

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;

use crate::version::error::TransportError;

/// One entry of the remote `index.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexEntry {
    /// Raw version as published, e.g. `"v4.1.0"` or `"4.1.0x"`
    pub version: String,
}

impl IndexEntry {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }
}

/// Build variant to download and store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit Windows build
    X64,
    /// 32-bit Windows build
    X86,
}

impl Arch {
    pub fn from_want_x64(want_x64: bool) -> Self {
        if want_x64 { Arch::X64 } else { Arch::X86 }
    }

    /// Path segment of the download URL
    pub fn url_segment(&self) -> &'static str {
        match self {
            Arch::X64 => "win-x64",
            Arch::X86 => "win-x86",
        }
    }

    /// Directory under the store root holding builds of this variant
    pub fn store_dir_name(&self) -> &'static str {
        match self {
            Arch::X64 => "v-x64",
            Arch::X86 => "v",
        }
    }
}

/// URL of the remote version index
pub fn index_url(source_url: &str) -> String {
    format!("{}/index.json", source_url.trim_end_matches('/'))
}

/// URL of the executable for `version` built for `arch`
pub fn binary_url(source_url: &str, version: &str, arch: Arch, executable: &str) -> String {
    format!(
        "{}/v{}/{}/{}",
        source_url.trim_end_matches('/'),
        version,
        arch.url_segment(),
        executable
    )
}

/// Trait for fetching the version index and release binaries
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fetches and decodes the JSON array at `url`
    async fn fetch_index(&self, url: &str) -> Result<Vec<IndexEntry>, TransportError>;

    /// Streams the body at `url` into the file at `dest`, creating or truncating it
    ///
    /// # Returns
    /// * `Ok(bytes)` - Number of bytes written
    /// * `Err(TransportError)` - Network failure, non-success status or write failure.
    ///   `dest` may have been partially written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, TransportError>;
}
