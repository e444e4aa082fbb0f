//! User-wide configuration that outlives this process: global Git settings,
//! persisted Go environment settings, and the shell startup file.

use std::fmt::Display;
use std::io::Write;
use std::process::Command;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use devsetup_utils::CommandRunExt;
use fn_error_context::context;

use crate::platform::Platform;

/// A single persisted setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum StoreKey {
    /// A key in the global Git configuration, e.g. `user.email`.
    Git(String),
    /// A Go environment variable as reported by `go env`.
    Go(String),
    /// The operator's shell startup file as a whole. Writing appends a line.
    ShellProfile,
}

impl StoreKey {
    pub(crate) fn git(k: impl Into<String>) -> Self {
        Self::Git(k.into())
    }

    pub(crate) fn go(k: impl Into<String>) -> Self {
        Self::Go(k.into())
    }
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKey::Git(k) => write!(f, "git config --global {k}"),
            StoreKey::Go(k) => write!(f, "go env {k}"),
            StoreKey::ShellProfile => f.write_str("shell profile"),
        }
    }
}

pub(crate) trait ConfigStore {
    /// Read a setting; `None` if it is unset or empty.
    fn read(&mut self, key: &StoreKey) -> Result<Option<String>>;

    /// Persist a setting. For [`StoreKey::ShellProfile`] the value is
    /// appended as a line.
    fn write(&mut self, key: &StoreKey, value: &str) -> Result<()>;

    /// Whether the setting's current value contains `pattern`.
    fn contains(&mut self, key: &StoreKey, pattern: &str) -> Result<bool> {
        Ok(self.read(key)?.is_some_and(|v| v.contains(pattern)))
    }
}

/// Pick the startup file that the operator's login shell reads.
pub(crate) fn default_shell_profile(
    platform: Platform,
    home: &Utf8Path,
    shell: Option<&str>,
) -> Utf8PathBuf {
    let shell = shell
        .and_then(|s| Utf8Path::new(s).file_name())
        .unwrap_or_default();
    let name = match (shell, platform) {
        ("zsh", _) => ".zshrc",
        // Terminal.app starts login shells, which don't read .bashrc
        ("bash", Platform::MacOs) => ".bash_profile",
        ("bash", Platform::Linux) => ".bashrc",
        _ => ".profile",
    };
    home.join(name)
}

/// The real store, backed by `git`, `go` and a file on disk.
#[derive(Debug)]
pub(crate) struct SystemStore {
    profile: Utf8PathBuf,
}

impl SystemStore {
    pub(crate) fn new(profile: Utf8PathBuf) -> Self {
        Self { profile }
    }

    fn read_git(k: &str) -> Result<Option<String>> {
        let (st, output) = Command::new("git")
            .args(["config", "--global", "--get", k])
            .run_combined()?;
        match st.code() {
            Some(0) => Ok(Some(output.trim().to_owned()).filter(|v| !v.is_empty())),
            // Documented as "the section or key is invalid", which includes unset
            Some(1) => Ok(None),
            _ => anyhow::bail!("Reading git config {k} failed: {st}: {}", output.trim()),
        }
    }

    #[context("Appending to {}", self.profile)]
    fn append_profile(&self, line: &str) -> Result<()> {
        let existing = match std::fs::read_to_string(&self.profile) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.profile)?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            f.write_all(b"\n")?;
        }
        writeln!(f, "{line}")?;
        f.flush()?;
        Ok(())
    }
}

impl ConfigStore for SystemStore {
    fn read(&mut self, key: &StoreKey) -> Result<Option<String>> {
        match key {
            StoreKey::Git(k) => Self::read_git(k),
            StoreKey::Go(k) => {
                let v = Command::new("go")
                    .args(["env", k.as_str()])
                    .run_get_string()
                    .with_context(|| format!("Reading go env {k}"))?;
                Ok(Some(v.trim().to_owned()).filter(|v| !v.is_empty()))
            }
            StoreKey::ShellProfile => match std::fs::read_to_string(&self.profile) {
                Ok(s) => Ok(Some(s)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e).with_context(|| format!("Reading {}", self.profile)),
            },
        }
    }

    fn write(&mut self, key: &StoreKey, value: &str) -> Result<()> {
        tracing::debug!("Setting {key} to {value}");
        match key {
            StoreKey::Git(k) => Command::new("git")
                .args(["config", "--global", k.as_str(), value])
                .run_with_cmd_context(),
            StoreKey::Go(k) => Command::new("go")
                .args(["env", "-w"])
                .arg(format!("{k}={value}"))
                .run_with_cmd_context(),
            StoreKey::ShellProfile => self.append_profile(value),
        }
    }
}
