//! Host OS and Linux distribution detection.
//!
//! The classification is derived once at startup and treated as immutable:
//! the operating system comes from `std::env::consts::OS`, the distribution
//! family from `/etc/os-release`. `ID_LIKE` is preferred over `ID` when both
//! are present, so derivatives (Ubuntu, Rocky, Manjaro, ...) collapse into
//! the family whose package manager they actually ship.

use anyhow::Result;
use std::fmt;
use std::fs;

/// Path consulted for Linux distribution metadata.
const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Operating system of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Any Linux distribution.
    Linux,
    /// Apple macOS.
    Macos,
    /// Microsoft Windows.
    Windows,
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        };
        write!(f, "{name}")
    }
}

/// Linux distribution family, keyed by native package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistroFamily {
    /// Debian, Ubuntu and derivatives (apt).
    Debian,
    /// Fedora, RHEL, CentOS and derivatives (dnf/microdnf/yum).
    Fedora,
    /// openSUSE and SLES (zypper).
    Suse,
    /// Arch and derivatives (pacman).
    Arch,
    /// Alpine (apk).
    Alpine,
    /// Unrecognized distribution, or a non-Linux host.
    Unknown,
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debian => "debian",
            Self::Fedora => "fedora",
            Self::Suse => "suse",
            Self::Arch => "arch",
            Self::Alpine => "alpine",
            Self::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Immutable host classification derived once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostClassification {
    /// Operating system.
    pub os: HostOs,
    /// Distribution family (always `Unknown` off Linux).
    pub distro: DistroFamily,
}

impl fmt::Display for HostClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.distro)
    }
}

/// Detect the host OS and distribution family.
///
/// # Errors
///
/// Returns an error if the operating system is not one of Linux, macOS or
/// Windows; an unrecognized host is fatal.
pub fn detect() -> Result<HostClassification> {
    let os = match std::env::consts::OS {
        "linux" => HostOs::Linux,
        "macos" => HostOs::Macos,
        "windows" => HostOs::Windows,
        other => anyhow::bail!("Unsupported host operating system: {other}"),
    };

    let distro = if os == HostOs::Linux {
        fs::read_to_string(OS_RELEASE_PATH)
            .map(|contents| classify_os_release(&contents))
            .unwrap_or(DistroFamily::Unknown)
    } else {
        DistroFamily::Unknown
    };

    Ok(HostClassification { os, distro })
}

/// Classify os-release contents into a distribution family.
///
/// `ID_LIKE` wins over `ID` when both are present.
#[must_use]
pub fn classify_os_release(contents: &str) -> DistroFamily {
    let mut id = None;
    let mut id_like = None;

    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("ID_LIKE=") {
            id_like = Some(unquote(value));
        } else if let Some(value) = line.strip_prefix("ID=") {
            id = Some(unquote(value));
        }
    }

    let key = id_like.or(id).unwrap_or_default();
    family_from_identifier(&key)
}

/// Map an os-release identifier (possibly a space-separated list) to a
/// distribution family by substring matching.
fn family_from_identifier(identifier: &str) -> DistroFamily {
    let id = identifier.to_lowercase();

    if id.contains("debian") || id.contains("ubuntu") {
        DistroFamily::Debian
    } else if id.contains("fedora") || id.contains("rhel") || id.contains("centos") {
        DistroFamily::Fedora
    } else if id.contains("suse") {
        DistroFamily::Suse
    } else if id.contains("arch") {
        DistroFamily::Arch
    } else if id.contains("alpine") {
        DistroFamily::Alpine
    } else {
        DistroFamily::Unknown
    }
}

/// Strip surrounding quotes and whitespace from an os-release value.
fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').trim_matches('\'').to_string()
}
