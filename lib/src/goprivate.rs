//! Let the Go toolchain fetch the organization's private modules.
//!
//! Three settings are involved: Go's `bin` directory on the shell's
//! `PATH`, a `GOPRIVATE` pattern so the public proxy and checksum database
//! are bypassed, and a Git URL rewrite so the resulting HTTPS fetches go
//! over SSH with the key set up earlier.

use anyhow::Result;

use crate::outcome::Outcome;
use crate::provision::Session;
use crate::store::StoreKey;

const GOPATH_BIN_LINE: &str = r#"export PATH="$PATH:$(go env GOPATH)/bin""#;

/// The `GOPRIVATE` value that covers `pattern`, or `None` if `current`
/// already does. Other patterns already present are kept.
fn goprivate_with(current: Option<&str>, pattern: &str) -> Option<String> {
    match current.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) if c.split(',').any(|p| p.trim() == pattern) => None,
        Some(c) => Some(format!("{c},{pattern}")),
        None => Some(pattern.to_owned()),
    }
}

fn ensure_goprivate(s: &mut Session) -> Result<Outcome> {
    let key = StoreKey::go("GOPRIVATE");
    let pattern = s.config.goprivate_pattern();
    let current = s.store.read(&key)?;
    let Some(value) = goprivate_with(current.as_deref(), &pattern) else {
        return Ok(Outcome::AlreadySatisfied);
    };
    s.ensure_setting(&key, &value, &format!("Set GOPRIVATE to {value}?"))
}

/// Apply each setting that is missing, asking first. Returns one outcome
/// per setting.
pub(crate) fn configure(s: &mut Session) -> Result<Vec<(String, Outcome)>> {
    if s.runner.which("go").is_none() {
        anyhow::bail!("Go is not installed; install it (for example with `brew install go`) and re-run");
    }

    let path = s.ensure_profile_line(
        GOPATH_BIN_LINE,
        "Add Go's bin directory to PATH in your shell startup file?",
    )?;
    let goprivate = ensure_goprivate(s)?;
    let (key, value) = s.config.insteadof_rule();
    let rewrite = s.ensure_setting(
        &StoreKey::git(key),
        &value,
        &format!("Make Git fetch {value} over SSH?"),
    )?;

    Ok(vec![
        ("Go binaries on PATH".into(), path),
        ("GOPRIVATE".into(), goprivate),
        ("Git HTTPS to SSH rewrite".into(), rewrite),
    ])
}
