use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// Output a warning message that we want to be quite visible.
pub(crate) fn medium_visibility_warning(s: &str) {
    anstream::eprintln!(
        "{}{s}{}",
        anstyle::AnsiColor::Red.render_fg(),
        anstyle::Reset.render()
    );
}

/// Print a line in green, for a step that just finished successfully.
pub(crate) fn success(s: &str) {
    anstream::println!(
        "{}{s}{}",
        anstyle::AnsiColor::Green.render_fg(),
        anstyle::Reset.render()
    );
}

/// The current user's home directory.
pub(crate) fn home_dir() -> Result<Utf8PathBuf> {
    let home = dirs::home_dir().context("Cannot determine home directory")?;
    Utf8PathBuf::from_path_buf(home)
        .map_err(|p| anyhow::anyhow!("Home directory {p:?} is not UTF-8"))
}

/// Expand a leading `~` (alone or followed by `/`) to `home`.
pub(crate) fn expand_tilde(input: &str, home: &Utf8Path) -> Utf8PathBuf {
    match input.strip_prefix('~') {
        Some("") => home.to_owned(),
        Some(rest) if rest.starts_with('/') => home.join(rest.trim_start_matches('/')),
        _ => Utf8PathBuf::from(input),
    }
}

/// Resolve a relative `p` against the current directory.
pub(crate) fn absolutize(p: &Utf8Path) -> Result<Utf8PathBuf> {
    if p.is_absolute() {
        return Ok(p.to_owned());
    }
    let cwd = std::env::current_dir().context("Reading current directory")?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|p| anyhow::anyhow!("Current directory {p:?} is not UTF-8"))?;
    Ok(cwd.join(p))
}
