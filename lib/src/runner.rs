//! Spawning external programs.
//!
//! Everything that touches the network or generates keys goes through
//! [`CommandRunner`], so the provisioning steps can be driven against a
//! scripted runner in tests.

use std::ffi::OsString;
use std::fmt::Display;
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use devsetup_utils::{ArgvQuotedDisplay, CommandRunExt};

/// A program to run, with its arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    pub(crate) env: Vec<(String, String)>,
    /// Inherit the terminal instead of capturing output.
    pub(crate) interactive: bool,
}

impl Invocation {
    pub(crate) fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            interactive: false,
        }
    }

    pub(crate) fn args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub(crate) fn env(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.env.push((k.into(), v.into()));
        self
    }

    pub(crate) fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub(crate) fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        ArgvQuotedDisplay::new(&self.argv()).fmt(f)
    }
}

/// The exit status and combined stdout/stderr of a finished program.
/// For interactive invocations the output is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandOutput {
    pub(crate) success: bool,
    pub(crate) code: Option<i32>,
    pub(crate) output: String,
}

impl CommandOutput {
    fn new(st: ExitStatus, output: String) -> Self {
        Self {
            success: st.success(),
            code: st.code(),
            output,
        }
    }
}

pub(crate) trait CommandRunner {
    /// Run the program to completion. An unsuccessful exit is not an error;
    /// only failing to spawn it is.
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Look up an executable by name on `PATH`, or check that an absolute
    /// path is executable.
    fn which(&self, name: &str) -> Option<Utf8PathBuf>;

    /// Put `bin_dir` at the front of the search path used by [`Self::which`]
    /// and by every program run afterwards.
    fn activate(&mut self, bin_dir: &Utf8Path) -> Result<()>;
}

/// Runs real programs on this machine.
#[derive(Debug, Default)]
pub(crate) struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd.envs(invocation.env.iter().map(|(k, v)| (k, v)));
        if invocation.interactive {
            let st = cmd
                .log_debug()
                .status()
                .with_context(|| format!("Spawning {invocation}"))?;
            Ok(CommandOutput::new(st, String::new()))
        } else {
            let (st, output) = cmd.run_combined()?;
            Ok(CommandOutput::new(st, output))
        }
    }

    fn which(&self, name: &str) -> Option<Utf8PathBuf> {
        which::which(name)
            .ok()
            .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
    }

    fn activate(&mut self, bin_dir: &Utf8Path) -> Result<()> {
        let current = std::env::var_os("PATH").unwrap_or_default();
        if std::env::split_paths(&current).any(|p| p == bin_dir.as_std_path()) {
            return Ok(());
        }
        let paths = std::iter::once(bin_dir.as_std_path().to_owned())
            .chain(std::env::split_paths(&current));
        let joined: OsString = std::env::join_paths(paths).context("Joining PATH")?;
        tracing::debug!("Prepending {bin_dir} to PATH");
        // We're single threaded; child processes inherit this.
        std::env::set_var("PATH", joined);
        Ok(())
    }
}
