use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

use anyhow::{Context, Result};
use fn_error_context::context;

use super::SshPaths;
use crate::runner::{CommandRunner, Invocation};

const SSH_DIR_MODE: u32 = 0o700;
const KNOWN_HOSTS_MODE: u32 = 0o644;

/// Create `~/.ssh` and `~/.ssh/known_hosts` if missing. Returns whether
/// anything was created; existing files are left as they are.
#[context("Preparing {}", paths.dir)]
pub(crate) fn bootstrap(paths: &SshPaths) -> Result<bool> {
    let mut changed = false;
    if !paths.dir.try_exists()? {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(SSH_DIR_MODE)
            .create(&paths.dir)?;
        // Don't depend on the umask
        std::fs::set_permissions(&paths.dir, std::fs::Permissions::from_mode(SSH_DIR_MODE))?;
        println!("Created {}", paths.dir);
        changed = true;
    }
    if !paths.known_hosts.try_exists()? {
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(KNOWN_HOSTS_MODE)
            .open(&paths.known_hosts)?;
        std::fs::set_permissions(
            &paths.known_hosts,
            std::fs::Permissions::from_mode(KNOWN_HOSTS_MODE),
        )?;
        changed = true;
    }
    Ok(changed)
}

/// Whether a host field from a known_hosts line (`host1,host2,[host]:22`)
/// names `host` on the default port.
fn hosts_field_matches(field: &str, host: &str) -> bool {
    field.split(',').any(|pattern| {
        pattern == host
            || pattern
                .strip_prefix('[')
                .and_then(|p| p.strip_suffix("]:22"))
                .is_some_and(|p| p == host)
    })
}

/// The host field and key of a known_hosts entry, skipping markers,
/// comments and blank lines.
fn entry(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
        return None;
    }
    line.split_once(char::is_whitespace)
        .map(|(hosts, key)| (hosts, key.trim_start()))
}

fn has_plain_entry(contents: &str, host: &str) -> bool {
    contents
        .lines()
        .filter_map(entry)
        .any(|(hosts, _)| hosts_field_matches(hosts, host))
}

fn has_hashed_entries(contents: &str) -> bool {
    contents
        .lines()
        .filter_map(entry)
        .any(|(hosts, _)| hosts.starts_with("|1|"))
}

/// Pick out the key lines for `host` from `ssh-keyscan` output, which
/// also carries comments and possibly diagnostics.
fn scanned_entries<'a>(output: &'a str, host: &str) -> Result<Vec<&'a str>> {
    let mut r = Vec::new();
    for line in output.lines() {
        let Some((hosts, key)) = entry(line) else {
            continue;
        };
        if !hosts_field_matches(hosts, host) {
            continue;
        }
        openssh_keys::PublicKey::parse(key)
            .with_context(|| format!("Parsing scanned host key for {host}"))?;
        r.push(line.trim());
    }
    anyhow::ensure!(!r.is_empty(), "ssh-keyscan returned no host keys for {host}");
    Ok(r)
}

/// Make sure `host` has an entry in the known hosts file, scanning its key
/// if needed. Returns whether an entry was appended.
#[context("Registering host key for {host}")]
pub(crate) fn register(runner: &mut dyn CommandRunner, paths: &SshPaths, host: &str) -> Result<bool> {
    let contents = std::fs::read_to_string(&paths.known_hosts)?;
    if has_plain_entry(&contents, host) {
        tracing::debug!("{host} already in {}", paths.known_hosts);
        return Ok(false);
    }
    if has_hashed_entries(&contents) {
        let found = runner.run(
            &Invocation::new("ssh-keygen").args(["-F", host, "-f", paths.known_hosts.as_str()]),
        )?;
        if found.success {
            tracing::debug!("{host} has a hashed entry in {}", paths.known_hosts);
            return Ok(false);
        }
    }

    println!("Adding the host key of {host} to {}", paths.known_hosts);
    let scan = runner.run(&Invocation::new("ssh-keyscan").args(["-t", "ed25519,ecdsa,rsa", host]))?;
    anyhow::ensure!(
        scan.success,
        "ssh-keyscan {host} failed: {}",
        scan.output.trim()
    );
    let entries = scanned_entries(&scan.output, host)?;

    let mut f = std::fs::OpenOptions::new()
        .append(true)
        .open(&paths.known_hosts)?;
    if !contents.is_empty() && !contents.ends_with('\n') {
        f.write_all(b"\n")?;
    }
    for e in entries {
        writeln!(f, "{e}")?;
    }
    f.flush()?;
    Ok(true)
}
