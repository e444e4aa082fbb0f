//! Standalone "ensure present" steps: the compiler toolchain, Homebrew
//! itself, and the packages installed through it.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use devsetup_utils::ArgvQuotedDisplay;

use crate::config::PackageSpec;
use crate::outcome::{Outcome, Report};
use crate::platform::Platform;
use crate::provision::Session;
use crate::runner::Invocation;
use crate::store::StoreKey;
use crate::utils::medium_visibility_warning;

/// Where the Homebrew installer puts `brew` on each supported machine, in
/// the order we look.
const HOMEBREW_PREFIXES: &[&str] = &["/opt/homebrew", "/usr/local", "/home/linuxbrew/.linuxbrew"];

const HOMEBREW_UNAVAILABLE: &str = "Homebrew unavailable";

/// Make sure a C compiler is available; Go needs one for cgo and Homebrew
/// needs one to build from source.
pub(crate) fn ensure_compiler(s: &mut Session) -> Result<Outcome> {
    match s.platform {
        Platform::MacOs => {
            let probe = Invocation::new("xcode-select").args(["-p"]);
            if s.runner.run(&probe)?.success {
                return Ok(Outcome::AlreadySatisfied);
            }
            if !s.prompt.ask_yes_no(
                "The Xcode Command Line Tools are not installed. Install them now?",
                true,
            )? {
                return Ok(Outcome::Skipped);
            }
            let install = Invocation::new("xcode-select")
                .args(["--install"])
                .interactive();
            let o = s.runner.run(&install)?;
            if !o.success {
                medium_visibility_warning(&format!("{install} failed"));
                return Ok(Outcome::Degraded("xcode-select --install failed".into()));
            }
            s.prompt
                .pause("Finish the installation in the dialog that opened, then press Enter")?;
            Ok(Outcome::Changed)
        }
        Platform::Linux => {
            if s.runner.which("cc").is_some() {
                return Ok(Outcome::AlreadySatisfied);
            }
            medium_visibility_warning(
                "No C compiler found. Install your distribution's build tools \
                 (for example build-essential, or gcc and make) and re-run.",
            );
            Ok(Outcome::Degraded("no C compiler".into()))
        }
    }
}

fn locate_homebrew(s: &Session) -> Option<Utf8PathBuf> {
    s.runner.which("brew").or_else(|| {
        HOMEBREW_PREFIXES
            .iter()
            .find_map(|prefix| s.runner.which(&format!("{prefix}/bin/brew")))
    })
}

/// Run the upstream installer script. Returns `brew` if it is usable
/// afterwards, otherwise why not.
fn bootstrap_homebrew(s: &mut Session) -> Result<std::result::Result<Utf8PathBuf, String>> {
    let url = std::slice::from_ref(&s.config.homebrew_install_url);
    let script = format!(
        "/bin/bash -c \"$(curl -fsSL {})\"",
        ArgvQuotedDisplay::new(url)
    );
    let inv = Invocation::new("/bin/bash")
        .args(["-c", script.as_str()])
        .interactive();
    println!("Installing Homebrew; it may ask for your password.");
    let o = s.runner.run(&inv)?;
    if !o.success {
        let why = match o.code {
            Some(code) => format!("installer exited with status {code}"),
            None => "installer was terminated".to_owned(),
        };
        return Ok(Err(why));
    }
    Ok(locate_homebrew(s).ok_or_else(|| "brew not found after installation".to_owned()))
}

/// Whether the profile already loads `brew shellenv`, however `brew` is
/// spelled there.
fn loads_shellenv(profile: &str) -> bool {
    profile.lines().map(str::trim).any(|l| {
        !l.starts_with('#') && l.contains("brew") && l.contains("shellenv")
    })
}

/// Make sure Homebrew is installed and on `PATH`, recording both steps in
/// `report`. Returns the `brew` executable, or `None` if later steps
/// cannot use Homebrew.
pub(crate) fn ensure_homebrew(s: &mut Session, report: &mut Report) -> Result<Option<Utf8PathBuf>> {
    let brew = match locate_homebrew(s) {
        Some(brew) => {
            report.record("Homebrew", Outcome::AlreadySatisfied);
            brew
        }
        None => {
            if !s
                .prompt
                .ask_yes_no("Homebrew is not installed. Install it now?", true)?
            {
                report.record("Homebrew", Outcome::Skipped);
                return Ok(None);
            }
            match bootstrap_homebrew(s)? {
                Ok(brew) => {
                    report.record("Homebrew", Outcome::Changed);
                    brew
                }
                Err(why) => {
                    medium_visibility_warning(&format!(
                        "Installing Homebrew failed ({why}); packages that need it will be skipped."
                    ));
                    report.record("Homebrew", Outcome::Degraded(why));
                    return Ok(None);
                }
            }
        }
    };
    tracing::debug!("Using {brew}");

    let bin_dir = brew
        .parent()
        .with_context(|| format!("Locating the directory of {brew}"))?;
    s.runner.activate(bin_dir)?;
    let profile = s.store.read(&StoreKey::ShellProfile)?;
    let outcome = if profile.as_deref().is_some_and(loads_shellenv) {
        Outcome::AlreadySatisfied
    } else {
        s.ensure_profile_line(
            &format!("eval \"$({brew} shellenv)\""),
            "Load Homebrew's environment from your shell startup file?",
        )?
    };
    report.record("Homebrew shell environment", outcome);
    Ok(Some(brew))
}

/// Make sure `pkg` is installed, using `brew` if it is not.
pub(crate) fn ensure_package(
    s: &mut Session,
    brew: Option<&Utf8Path>,
    pkg: &PackageSpec,
) -> Result<Outcome> {
    if let Some(p) = s.runner.which(&pkg.binary) {
        tracing::debug!("{} is installed at {p}", pkg.name);
        return Ok(Outcome::AlreadySatisfied);
    }
    let Some(brew) = brew else {
        println!("Cannot install {} without Homebrew.", pkg.name);
        return Ok(Outcome::Degraded(HOMEBREW_UNAVAILABLE.into()));
    };
    if !s.prompt.ask_yes_no(
        &format!("{} is not installed. Install it with Homebrew?", pkg.name),
        true,
    )? {
        return Ok(Outcome::Skipped);
    }
    let mut inv = Invocation::new(brew.as_str()).args(["install"]);
    // Casks are a macOS concept
    if pkg.cask && s.platform.is_macos() {
        inv = inv.args(["--cask"]);
    }
    let inv = inv.args([pkg.formula.as_str()]).interactive();
    let o = s.runner.run(&inv)?;
    if !o.success {
        medium_visibility_warning(&format!("{inv} failed; continuing without {}", pkg.name));
        return Ok(Outcome::Degraded(format!("brew install {} failed", pkg.formula)));
    }
    crate::utils::success(&format!("Installed {}.", pkg.name));
    Ok(Outcome::Changed)
}
