//! Target platform detection.
//!
//! Platform and architecture use the node naming scheme (`win32`, `darwin`,
//! `linux`; `x64`, `ia32`, `arm64`) because the runtime, the package names and
//! the `npm_config_arch` override all speak it.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Environment variable npm sets for `--arch` when cross-packaging.
pub const ARCH_OVERRIDE_VAR: &str = "npm_config_arch";

/// Operating system and CPU architecture the package is built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlatformTarget {
    pub os: String,
    pub arch: String,
}

/// The closed set of layout conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    Windows,
    MacOs,
    Posix,
}

impl PlatformTarget {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Which layout convention applies to this target.
    pub fn family(&self) -> PlatformFamily {
        match self.os.as_str() {
            "win32" => PlatformFamily::Windows,
            "darwin" => PlatformFamily::MacOs,
            _ => PlatformFamily::Posix,
        }
    }

    /// `<os>-<arch>`, as used in package file names.
    pub fn slug(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformFamily::Windows => write!(f, "windows"),
            PlatformFamily::MacOs => write!(f, "macos"),
            PlatformFamily::Posix => write!(f, "posix"),
        }
    }
}

/// Snapshot of the ambient process state the pipeline depends on.
///
/// Captured once in `main` and passed down explicitly; nothing below the
/// binary reads `std::env` on its own.
#[derive(Debug, Clone, Default)]
pub struct HostEnvironment {
    pub os: String,
    pub arch: String,
    pub vars: BTreeMap<String, String>,
}

impl HostEnvironment {
    /// Capture the running process's platform and the variables we care about.
    pub fn capture() -> Self {
        let vars = [
            ARCH_OVERRIDE_VAR,
            crate::config::VERSION_VAR,
            crate::config::VS_INSTALL_VAR,
        ]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect();

        Self {
            os: node_platform(std::env::consts::OS).to_string(),
            arch: node_arch(std::env::consts::ARCH).to_string(),
            vars,
        }
    }

    /// A synthetic host, for planning packages of other platforms and for tests.
    pub fn synthetic(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            vars: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Resolve the target: the host OS and architecture.
    ///
    /// On Windows `npm_config_arch`, when set, replaces the architecture and
    /// selects the 32- or 64-bit redistributables. Other platforms always
    /// package the binaries built for the host.
    pub fn target(&self) -> PlatformTarget {
        let target = PlatformTarget::new(self.os.clone(), self.arch.clone());
        if target.family() != PlatformFamily::Windows {
            return target;
        }
        match self.var(ARCH_OVERRIDE_VAR) {
            Some(arch) => PlatformTarget::new(target.os, node_arch(arch.trim())),
            None => target,
        }
    }
}

/// Map a Rust `target_os` name onto node's `process.platform`.
pub fn node_platform(os: &str) -> &str {
    match os {
        "windows" => "win32",
        "macos" => "darwin",
        other => other,
    }
}

/// Map a Rust `target_arch` name onto node's `process.arch`.
pub fn node_arch(arch: &str) -> &str {
    match arch {
        "x86_64" | "amd64" => "x64",
        "x86" | "i686" | "i386" => "ia32",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_follows_os() {
        assert_eq!(
            PlatformTarget::new("win32", "x64").family(),
            PlatformFamily::Windows
        );
        assert_eq!(
            PlatformTarget::new("darwin", "arm64").family(),
            PlatformFamily::MacOs
        );
        assert_eq!(
            PlatformTarget::new("linux", "x64").family(),
            PlatformFamily::Posix
        );
        assert_eq!(
            PlatformTarget::new("freebsd", "x64").family(),
            PlatformFamily::Posix
        );
    }

    #[test]
    fn rust_names_map_to_node_names() {
        assert_eq!(node_platform("windows"), "win32");
        assert_eq!(node_platform("macos"), "darwin");
        assert_eq!(node_platform("linux"), "linux");
        assert_eq!(node_arch("x86_64"), "x64");
        assert_eq!(node_arch("x86"), "ia32");
        assert_eq!(node_arch("aarch64"), "arm64");
    }

    #[test]
    fn arch_override_replaces_host_arch() {
        let host = HostEnvironment::synthetic("win32", "x64").with_var(ARCH_OVERRIDE_VAR, "ia32");
        assert_eq!(host.target(), PlatformTarget::new("win32", "ia32"));
    }

    #[test]
    fn blank_override_is_ignored() {
        let host = HostEnvironment::synthetic("win32", "x64").with_var(ARCH_OVERRIDE_VAR, "  ");
        assert_eq!(host.target().arch, "x64");
    }

    #[test]
    fn override_does_not_apply_outside_windows() {
        for os in ["linux", "darwin"] {
            let host = HostEnvironment::synthetic(os, "x64").with_var(ARCH_OVERRIDE_VAR, "arm64");
            assert_eq!(host.target(), PlatformTarget::new(os, "x64"));
        }
    }

    #[test]
    fn slug_joins_os_and_arch() {
        assert_eq!(PlatformTarget::new("darwin", "x64").slug(), "darwin-x64");
    }
}
