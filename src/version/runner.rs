//! Running installed builds

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

#[cfg(test)]
use mockall::automock;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::version::error::ManagerError;
use crate::version::manager::VersionManager;

/// Matches the `vX.Y.Z` banner printed by `<exe> -v`
static VERSION_BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+\.\d+\.\d+)").expect("valid version regex"));

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, or None when the child was terminated by a signal
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait for spawning processes
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with inherited stdio and waits for it to exit
    async fn run(&self, program: &Path, args: &[String], cwd: &Path) -> io::Result<ExitOutcome>;

    /// Runs `program` and returns its standard output
    async fn capture_stdout(&self, program: &Path, args: &[String]) -> io::Result<String>;
}

/// ProcessRunner backed by tokio::process
pub struct SystemRunner;

#[async_trait::async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[String], cwd: &Path) -> io::Result<ExitOutcome> {
        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        Ok(ExitOutcome {
            code: status.code(),
        })
    }

    async fn capture_stdout(&self, program: &Path, args: &[String]) -> io::Result<String> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Extract `X.Y.Z` from a version banner such as `"v4.1.0\r\n"`
pub fn parse_version_banner(output: &str) -> Option<String> {
    VERSION_BANNER
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Ask the executable at `exe` which version it is
pub async fn probe_version(runner: &dyn ProcessRunner, exe: &Path) -> Result<String, ManagerError> {
    let output = runner
        .capture_stdout(exe, &["-v".to_string()])
        .await
        .map_err(|source| ManagerError::Spawn {
            program: exe.to_path_buf(),
            source,
        })?;

    Ok(parse_version_banner(&output).unwrap_or_else(|| output.trim().to_string()))
}

impl VersionManager {
    /// Install `version` if needed, then run it with `args`
    ///
    /// A child exiting non-zero is a successful run: its code is in the
    /// returned [`ExitOutcome`]. Only failing to start it is an error.
    pub async fn emulate(
        &self,
        version: &str,
        args: &[String],
    ) -> Result<ExitOutcome, ManagerError> {
        self.install(version).await?;

        let program = self.store().exe_path(version);
        let cwd = Self::current_dir()?;
        debug!("Running {} {:?}", program.display(), args);

        self.runner()
            .run(&program, args, &cwd)
            .await
            .map_err(|source| ManagerError::Spawn { program, source })
    }

    /// Version reported by an installed build's own banner
    pub async fn probe_installed(&self, version: &str) -> Result<String, ManagerError> {
        probe_version(self.runner().as_ref(), &self.store().exe_path(version)).await
    }
}
