//! Helpers intended for [`std::process::Command`].

use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};

/// Helpers intended for [`std::process::Command`].
pub trait CommandRunExt {
    /// Log (at debug level) the full child commandline.
    fn log_debug(&mut self) -> &mut Self;

    /// Synchronously execute the child with inherited stdio, and return an
    /// error if the child exited unsuccessfully. The error includes the
    /// full command line.
    fn run_with_cmd_context(&mut self) -> Result<()>;

    /// Execute the child without stdin, capturing stdout and stderr. The
    /// exit status is returned rather than checked; the output is stdout
    /// followed by stderr, lossily decoded as UTF-8.
    fn run_combined(&mut self) -> Result<(ExitStatus, String)>;

    /// Execute the child without stdin and return its stdout, erroring if
    /// the child exited unsuccessfully. Stderr is included in the error.
    fn run_get_string(&mut self) -> Result<String>;
}

impl CommandRunExt for Command {
    fn log_debug(&mut self) -> &mut Self {
        tracing::debug!("exec: {self:?}");
        self
    }

    fn run_with_cmd_context(&mut self) -> Result<()> {
        let st = self
            .log_debug()
            .status()
            .with_context(|| format!("Spawning {self:?}"))?;
        if !st.success() {
            anyhow::bail!("Command {self:?} failed: {st}");
        }
        Ok(())
    }

    fn run_combined(&mut self) -> Result<(ExitStatus, String)> {
        let o = self
            .log_debug()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Spawning {self:?}"))?;
        let mut combined = String::from_utf8_lossy(&o.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&o.stderr));
        tracing::trace!("{self:?} exited with {}", o.status);
        Ok((o.status, combined))
    }

    fn run_get_string(&mut self) -> Result<String> {
        let o = self
            .log_debug()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Spawning {self:?}"))?;
        if !o.status.success() {
            let stderr = String::from_utf8_lossy(&o.stderr);
            anyhow::bail!("Command {self:?} failed: {}: {}", o.status, stderr.trim());
        }
        String::from_utf8(o.stdout).with_context(|| format!("Decoding output of {self:?}"))
    }
}
