//! # Command line interface
//!
//! There are no subcommands: the program always runs the whole
//! provisioning sequence, asking before it changes anything.

use std::ffi::OsString;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;

use crate::config::Config;
use crate::interaction::Terminal;
use crate::platform::Platform;
use crate::provision::Session;
use crate::runner::SystemRunner;
use crate::store::{default_shell_profile, SystemStore};

/// Prepare this machine for working on the organization's Go repositories.
///
/// Installs missing prerequisites, sets up SSH access to the Git host,
/// configures Go to fetch private modules, and installs the internal
/// command line tool. Safe to run again at any time.
#[derive(Debug, Parser, PartialEq, Eq)]
#[clap(name = "devsetup")]
#[clap(rename_all = "kebab-case")]
#[clap(version)]
pub struct Opts {
    /// Path to a YAML file overriding the built-in organization settings.
    #[clap(long, env = "DEVSETUP_CONFIG")]
    pub config: Option<Utf8PathBuf>,
}

/// Parse the provided arguments and run the provisioning sequence.
pub fn run_from_iter<I>(args: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    run_from_opt(Opts::parse_from(args))
}

fn preflight() {
    if rustix::process::getuid().is_root() {
        crate::utils::medium_visibility_warning(
            "Running as root: Homebrew refuses to install as root, and keys and \
             settings will be created for root rather than your own account.",
        );
    }
}

/// Internal (non-generic/monomorphized) primary CLI entrypoint
fn run_from_opt(opts: Opts) -> Result<()> {
    let config = Config::load(opts.config.as_deref())?;
    let platform = Platform::detect()?;
    tracing::debug!("Provisioning for {platform}");
    preflight();

    let home = crate::utils::home_dir()?;
    let profile = match config.shell_profile.clone() {
        Some(p) => p,
        None => {
            let shell = std::env::var("SHELL").ok();
            default_shell_profile(platform, &home, shell.as_deref())
        }
    };
    tracing::debug!("Shell startup file: {profile}");

    let mut runner = SystemRunner;
    let mut prompt = Terminal;
    let mut store = SystemStore::new(profile);
    let mut session = Session {
        config: &config,
        platform,
        home,
        runner: &mut runner,
        prompt: &mut prompt,
        store: &mut store,
    };
    println!("Setting up this {platform} machine for {}.", config.organization);
    let report = crate::provision::run(&mut session)?;
    report.print();
    Ok(())
}
