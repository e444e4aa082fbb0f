use std::fmt::Display;

use anyhow::Result;

/// The operating system family we are provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Platform {
    MacOs,
    Linux,
}

impl Platform {
    pub(crate) fn detect() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    fn from_os(os: &str) -> Result<Self> {
        match os {
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            o => anyhow::bail!("Unsupported platform: {o}"),
        }
    }

    pub(crate) fn is_macos(self) -> bool {
        self == Self::MacOs
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::MacOs => f.write_str("macOS"),
            Platform::Linux => f.write_str("Linux"),
        }
    }
}
