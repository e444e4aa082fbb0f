use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

use crate::outcome::Outcome;
use crate::provision::Session;
use crate::runner::Invocation;
use crate::store::StoreKey;

/// Look for the tool on `PATH`, then where `go install` puts it: `GOBIN`
/// if set, otherwise the `bin` directory of the first `GOPATH` entry.
fn locate(s: &mut Session) -> Result<Option<Utf8PathBuf>> {
    let binary = s.config.tool.binary.as_str();
    if let Some(p) = s.runner.which(binary) {
        return Ok(Some(p));
    }
    let install_dir = match s.store.read(&StoreKey::go("GOBIN"))? {
        Some(gobin) => Some(Utf8PathBuf::from(gobin)),
        None => s
            .store
            .read(&StoreKey::go("GOPATH"))?
            .as_deref()
            .and_then(|g| g.split(':').find(|p| !p.is_empty()))
            .map(|first| Utf8Path::new(first).join("bin")),
    };
    let Some(dir) = install_dir else {
        return Ok(None);
    };
    Ok(s.runner.which(dir.join(binary).as_str()))
}

/// Install the organization's command line tool if it is missing.
/// A failed installation is fatal.
pub(crate) fn ensure_tool(s: &mut Session) -> Result<Outcome> {
    if let Some(p) = locate(s)? {
        tracing::debug!("Found {p}");
        return Ok(Outcome::AlreadySatisfied);
    }
    let tool = &s.config.tool;
    let target = format!("{}@{}", tool.module, tool.version);
    if !s.prompt.ask_yes_no(
        &format!("{} is not installed. Install it with go install?", tool.binary),
        true,
    )? {
        return Ok(Outcome::Skipped);
    }
    let inv = Invocation::new("go")
        .args(["install", target.as_str()])
        .interactive();
    println!("Running {inv}");
    let o = s.runner.run(&inv)?;
    if !o.success {
        anyhow::bail!(
            "{inv} failed; check SSH access to {} and GOPRIVATE, then re-run",
            s.config.git_host
        );
    }
    crate::utils::success(&format!("Installed {}.", tool.binary));
    Ok(Outcome::Changed)
}
