//! Settings that describe the organization being provisioned for.
//!
//! Every field has a built-in default; a YAML file given with `--config`
//! (or `DEVSETUP_CONFIG`) overrides individual fields.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fn_error_context::context;
use serde::Deserialize;

use crate::platform::Platform;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct Config {
    /// The Git hosting service, reached over SSH.
    pub(crate) git_host: String,
    /// The organization owning the private repositories.
    pub(crate) organization: String,
    /// A repository every developer can read; used to prove SSH access.
    pub(crate) probe_repository: String,
    /// Offered as the location for a newly generated key.
    pub(crate) default_key_path: String,
    /// Offered as the key comment when Git has no `user.email`.
    pub(crate) fallback_email: String,
    /// Where the operator registers a new public key.
    pub(crate) key_settings_url: String,
    pub(crate) homebrew_install_url: String,
    /// Packages to ensure via Homebrew; defaults depend on the platform.
    pub(crate) packages: Option<Vec<PackageSpec>>,
    pub(crate) tool: ToolSpec,
    /// Overrides shell startup file detection.
    pub(crate) shell_profile: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git_host: "github.com".into(),
            organization: "example-org".into(),
            probe_repository: "git@github.com:example-org/devtools.git".into(),
            default_key_path: "~/.ssh/id_ed25519".into(),
            fallback_email: "developer@example-org.com".into(),
            key_settings_url: "https://github.com/settings/keys".into(),
            homebrew_install_url:
                "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh".into(),
            packages: None,
            tool: ToolSpec::default(),
            shell_profile: None,
        }
    }
}

/// A package installed through Homebrew.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PackageSpec {
    /// Human readable name.
    pub(crate) name: String,
    pub(crate) formula: String,
    /// Executable whose presence means the package is installed.
    pub(crate) binary: String,
    /// Install as a cask; ignored outside macOS.
    #[serde(default)]
    pub(crate) cask: bool,
}

impl PackageSpec {
    fn formula(name: &str, formula: &str, binary: &str) -> Self {
        Self {
            name: name.into(),
            formula: formula.into(),
            binary: binary.into(),
            cask: false,
        }
    }
}

/// The internal tool installed with `go install`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct ToolSpec {
    pub(crate) module: String,
    pub(crate) version: String,
    pub(crate) binary: String,
}

impl Default for ToolSpec {
    fn default() -> Self {
        Self {
            module: "github.com/example-org/devtools/cmd/devtool".into(),
            version: "latest".into(),
            binary: "devtool".into(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or the defaults if there is none.
    pub(crate) fn load(path: Option<&Utf8Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    #[context("Loading configuration from {path}")]
    fn from_file(path: &Utf8Path) -> Result<Self> {
        let buf = std::fs::read(path)?;
        serde_yaml::from_slice(&buf).context("Parsing")
    }

    /// The packages to ensure on `platform`.
    pub(crate) fn packages(&self, platform: Platform) -> Vec<PackageSpec> {
        if let Some(p) = self.packages.as_ref() {
            return p.clone();
        }
        let runtime = match platform {
            Platform::MacOs => PackageSpec {
                cask: true,
                ..PackageSpec::formula("Docker", "docker", "docker")
            },
            Platform::Linux => PackageSpec::formula("Podman", "podman", "podman"),
        };
        vec![
            PackageSpec::formula("Git", "git", "git"),
            PackageSpec::formula("Go", "go", "go"),
            runtime,
        ]
    }

    /// The `GOPRIVATE` pattern covering the organization's modules.
    pub(crate) fn goprivate_pattern(&self) -> String {
        format!("{}/{}/*", self.git_host, self.organization)
    }

    /// The Git `insteadOf` key and value that send HTTPS fetches of the
    /// organization's repositories over SSH.
    pub(crate) fn insteadof_rule(&self) -> (String, String) {
        let (host, org) = (&self.git_host, &self.organization);
        (
            format!("url.git@{host}:{org}/.insteadOf"),
            format!("https://{host}/{org}/"),
        )
    }
}
