//! Editing `~/.ssh/config`.
//!
//! We only ever touch one `Host` stanza: the one for the Git host. Its
//! `IdentityFile` is rewritten in place; everything else in the file is
//! preserved byte for byte.

use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use anyhow::Result;
use camino::Utf8Path;
use fn_error_context::context;

use crate::platform::Platform;

const CONFIG_MODE: u32 = 0o600;
const DEFAULT_INDENT: &str = "  ";

/// Split a config line into its keyword and arguments. Keywords and
/// arguments may be separated by whitespace or `=`.
fn keyword(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let end = line
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(line.len());
    let (k, rest) = line.split_at(end);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim_start();
    Some((k, rest))
}

fn is_section_start(line: &str) -> bool {
    keyword(line).is_some_and(|(k, _)| {
        k.eq_ignore_ascii_case("host") || k.eq_ignore_ascii_case("match")
    })
}

fn is_host_stanza_for(line: &str, host: &str) -> bool {
    keyword(line).is_some_and(|(k, args)| {
        k.eq_ignore_ascii_case("host") && args.split_whitespace().any(|p| p == host)
    })
}

fn is_identity_file(line: &str) -> bool {
    keyword(line).is_some_and(|(k, _)| k.eq_ignore_ascii_case("identityfile"))
}

fn indentation(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn format_identity(key: &Utf8Path) -> String {
    if key.as_str().contains(char::is_whitespace) {
        format!("\"{key}\"")
    } else {
        key.to_string()
    }
}

/// A fresh stanza for `host`.
pub(crate) fn stanza(host: &str, key: &Utf8Path, platform: Platform) -> String {
    let mut lines = vec![format!("Host {host}"), "AddKeysToAgent yes".to_owned()];
    if platform.is_macos() {
        lines.push("UseKeychain yes".to_owned());
    }
    lines.push("ServerAliveInterval 60".to_owned());
    lines.push(format!("IdentityFile {}", format_identity(key)));
    let mut r = String::new();
    for (i, l) in lines.iter().enumerate() {
        if i > 0 {
            r.push_str(DEFAULT_INDENT);
        }
        r.push_str(l);
        r.push('\n');
    }
    r
}

/// Point the stanza for `host` at `key`, appending a stanza if there is none.
pub(crate) fn patch(contents: &str, host: &str, key: &Utf8Path, platform: Platform) -> String {
    let lines: Vec<&str> = contents.lines().collect();
    let Some(start) = lines.iter().position(|l| is_host_stanza_for(l, host)) else {
        let mut r = contents.to_owned();
        if !r.is_empty() {
            if !r.ends_with('\n') {
                r.push('\n');
            }
            r.push('\n');
        }
        r.push_str(&stanza(host, key, platform));
        return r;
    };
    let end = lines[start + 1..]
        .iter()
        .position(|l| is_section_start(l))
        .map(|i| start + 1 + i)
        .unwrap_or(lines.len());

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    let directive = format!("IdentityFile {}", format_identity(key));
    if let Some(i) = (start + 1..end).find(|&i| is_identity_file(lines[i])) {
        out[i] = format!("{}{directive}", indentation(lines[i]));
    } else {
        let indent = lines[start + 1..end]
            .iter()
            .find(|l| keyword(l).is_some())
            .map(|l| indentation(l))
            .unwrap_or(DEFAULT_INDENT);
        out.insert(start + 1, format!("{indent}{directive}"));
    }
    let mut r = out.join("\n");
    r.push('\n');
    r
}

/// Create the config file if needed and point the `host` stanza at `key`.
#[context("Updating {path}")]
pub(crate) fn update(path: &Utf8Path, host: &str, key: &Utf8Path, platform: Platform) -> Result<()> {
    if !path.try_exists()? {
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(CONFIG_MODE)
            .open(path)?;
    }
    let contents = std::fs::read_to_string(path)?;
    let patched = patch(&contents, host, key, platform);
    if patched != contents {
        let dir = path.parent().unwrap_or(Utf8Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(patched.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;
        println!("Updated {path} to use {key} for {host}");
    }
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(CONFIG_MODE))?;
    Ok(())
}
