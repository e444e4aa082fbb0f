//! The fixed provisioning sequence.

use anyhow::Result;
use camino::Utf8PathBuf;

use crate::config::Config;
use crate::interaction::Interaction;
use crate::outcome::{Outcome, Report};
use crate::platform::Platform;
use crate::runner::CommandRunner;
use crate::store::{ConfigStore, StoreKey};

/// The capabilities and settings shared by every step.
pub(crate) struct Session<'a> {
    pub(crate) config: &'a Config,
    pub(crate) platform: Platform,
    pub(crate) home: Utf8PathBuf,
    pub(crate) runner: &'a mut dyn CommandRunner,
    pub(crate) prompt: &'a mut dyn Interaction,
    pub(crate) store: &'a mut dyn ConfigStore,
}

impl<'a> Session<'a> {
    /// Make `key` equal `value`, asking first. Untouched if already equal.
    pub(crate) fn ensure_setting(
        &mut self,
        key: &StoreKey,
        value: &str,
        question: &str,
    ) -> Result<Outcome> {
        if self.store.read(key)?.as_deref() == Some(value) {
            return Ok(Outcome::AlreadySatisfied);
        }
        if !self.prompt.ask_yes_no(question, true)? {
            return Ok(Outcome::Skipped);
        }
        self.store.write(key, value)?;
        Ok(Outcome::Changed)
    }

    /// Append `line` to the shell startup file, asking first. Untouched if
    /// the file already has it.
    pub(crate) fn ensure_profile_line(&mut self, line: &str, question: &str) -> Result<Outcome> {
        if self.store.contains(&StoreKey::ShellProfile, line)? {
            return Ok(Outcome::AlreadySatisfied);
        }
        if !self.prompt.ask_yes_no(question, true)? {
            return Ok(Outcome::Skipped);
        }
        self.store.write(&StoreKey::ShellProfile, line)?;
        Ok(Outcome::Changed)
    }
}

/// Run every step in order. Fatal failures abort the whole run; everything
/// else is recorded in the returned report.
pub(crate) fn run(s: &mut Session) -> Result<Report> {
    let mut report = Report::default();

    report.record("Compiler toolchain", crate::installers::ensure_compiler(s)?);
    let brew = crate::installers::ensure_homebrew(s, &mut report)?;
    for pkg in s.config.packages(s.platform) {
        let outcome = crate::installers::ensure_package(s, brew.as_deref(), &pkg)?;
        report.record(pkg.name, outcome);
    }

    report.record(
        format!("SSH access to {}", s.config.git_host),
        crate::ssh::establish_access(s)?,
    );

    for (step, outcome) in crate::goprivate::configure(s)? {
        report.record(step, outcome);
    }

    report.record(
        s.config.tool.binary.clone(),
        crate::tool::ensure_tool(s)?,
    );

    Ok(report)
}
