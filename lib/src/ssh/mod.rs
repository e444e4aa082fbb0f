//! # Establishing SSH access to the Git host
//!
//! The workflow is a small state machine:
//!
//! ```text
//! Bootstrap -> RegisterHostKey -> Verify --success--> accept
//!                                   |  ^
//!                  permission denied|  |once
//!                                   v  |
//!                                 Remediate (generate key, configure, wait)
//! ```
//!
//! Anything else out of `Verify` is terminal, as is a second permission
//! denial after remediation.

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

use crate::outcome::Outcome;
use crate::provision::Session;
use crate::runner::{CommandOutput, Invocation};

mod client_config;
mod keygen;
mod known_hosts;

/// Matched case-insensitively against the probe output.
const PERMISSION_DENIED_MARKER: &str = "permission denied";
const NOT_FOUND_MARKER: &str = "repository not found";

/// The files under `~/.ssh` that we manage.
#[derive(Debug, Clone)]
pub(crate) struct SshPaths {
    pub(crate) dir: Utf8PathBuf,
    pub(crate) known_hosts: Utf8PathBuf,
    pub(crate) config: Utf8PathBuf,
}

impl SshPaths {
    pub(crate) fn new(home: &Utf8Path) -> Self {
        let dir = home.join(".ssh");
        Self {
            known_hosts: dir.join("known_hosts"),
            config: dir.join("config"),
            dir,
        }
    }
}

/// Terminal failures of the workflow.
#[derive(Debug, thiserror::Error)]
pub(crate) enum AccessError {
    #[error("Repository {0} was not found; ask an administrator to grant your account access")]
    RepositoryNotFound(String),
    #[error("Unrecognized failure connecting to {host}: {output}")]
    Unrecognized { host: String, output: String },
    #[error("No SSH key was generated; add an existing key to your account and re-run")]
    RemediationDeclined,
    #[error("Access to {0} is still denied after registering the new key")]
    StillDenied(String),
    #[error("Generating SSH key at {path} failed: {output}")]
    KeyGeneration { path: Utf8PathBuf, output: String },
}

/// The result of probing the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connectivity {
    Success,
    PermissionDenied,
    NotFound,
    Unknown,
}

impl Connectivity {
    pub(crate) fn classify(o: &CommandOutput) -> Self {
        if o.success {
            return Self::Success;
        }
        let output = o.output.to_ascii_lowercase();
        if output.contains(PERMISSION_DENIED_MARKER) {
            Self::PermissionDenied
        } else if output.contains(NOT_FOUND_MARKER) {
            Self::NotFound
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Bootstrap,
    RegisterHostKey,
    Verify { remediated: bool },
    Remediate,
}

fn probe(s: &mut Session) -> Result<CommandOutput> {
    let repo = &s.config.probe_repository;
    // Never block on a password or passphrase prompt
    let inv = Invocation::new("git")
        .args(["ls-remote", repo.as_str()])
        .env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes")
        .env("GIT_TERMINAL_PROMPT", "0");
    s.runner.run(&inv)
}

/// Bring the machine to proven, passwordless SSH access to the Git host.
pub(crate) fn establish_access(s: &mut Session) -> Result<Outcome> {
    let paths = SshPaths::new(&s.home);
    let host = s.config.git_host.clone();
    let mut changed = false;
    let mut state = State::Bootstrap;
    loop {
        tracing::debug!("ssh: {state:?}");
        state = match state {
            State::Bootstrap => {
                changed |= known_hosts::bootstrap(&paths)?;
                State::RegisterHostKey
            }
            State::RegisterHostKey => {
                changed |= known_hosts::register(s.runner, &paths, &host)?;
                State::Verify { remediated: false }
            }
            State::Verify { remediated } => {
                println!("Checking SSH access to {host}...");
                let o = probe(s)?;
                match Connectivity::classify(&o) {
                    Connectivity::Success => {
                        crate::utils::success(&format!("SSH access to {host} works."));
                        return Ok(if changed {
                            Outcome::Changed
                        } else {
                            Outcome::AlreadySatisfied
                        });
                    }
                    Connectivity::PermissionDenied if remediated => {
                        println!(
                            "Make sure the key was added at {} and that your account \
                             is authorized for the organization.",
                            s.config.key_settings_url
                        );
                        return Err(AccessError::StillDenied(host).into());
                    }
                    Connectivity::PermissionDenied => {
                        println!("{host} denied access with your current SSH keys.");
                        State::Remediate
                    }
                    Connectivity::NotFound => {
                        return Err(
                            AccessError::RepositoryNotFound(s.config.probe_repository.clone())
                                .into(),
                        );
                    }
                    Connectivity::Unknown => {
                        return Err(AccessError::Unrecognized {
                            host,
                            output: o.output.trim().to_owned(),
                        }
                        .into());
                    }
                }
            }
            State::Remediate => {
                if !s
                    .prompt
                    .ask_yes_no("Generate a new SSH key for this machine?", true)?
                {
                    println!(
                        "Add an existing public key at {} and run this again.",
                        s.config.key_settings_url
                    );
                    return Err(AccessError::RemediationDeclined.into());
                }
                keygen::remediate(s, &paths)?;
                changed = true;
                State::Verify { remediated: true }
            }
        };
    }
}
