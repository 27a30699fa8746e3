//! Packaging configuration.
//!
//! Everything a run needs is resolved once into an immutable
//! [`PackageConfig`]: optional `launchui-pack.toml` at the project root,
//! overridden by the captured environment, overridden by command-line flags.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PackError, Result};
use crate::platform::{node_arch, HostEnvironment, PlatformTarget};

pub const CONFIG_FILENAME: &str = "launchui-pack.toml";

/// Set by npm when the packager runs from a package script.
pub const VERSION_VAR: &str = "npm_package_version";

/// Set by the Visual Studio developer prompt.
pub const VS_INSTALL_VAR: &str = "VSINSTALLDIR";

pub const DEFAULT_PRODUCT: &str = "launchui";
pub const DEFAULT_PACKAGES_DIR: &str = "packages";
pub const DEFAULT_SEVEN_ZIP: &str = "7z";
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 9;
pub const DEFAULT_UCRT_REDIST_DIR: &str =
    r"C:\Program Files (x86)\Windows Kits\10\Redist\ucrt\DLLs";

/// How the runtime library filename is determined on non-Windows targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeLookup {
    /// Format the name from the runtime's `NODE_MODULE_VERSION`.
    #[default]
    ModuleVersion,
    /// List the runtime output directory and take the first `libnode.*`.
    Discover,
}

/// Toolchain locations needed only for Windows packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsToolchain {
    pub vs_install_dir: Option<PathBuf>,
    pub ucrt_redist_dir: PathBuf,
}

/// Command-line overrides; highest precedence.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub arch: Option<String>,
    pub version: Option<String>,
}

/// Resolved, immutable configuration for one packaging run.
#[derive(Debug, Clone)]
pub struct PackageConfig {
    pub project_root: PathBuf,
    pub product: String,
    pub version: String,
    pub target: PlatformTarget,
    pub compression_level: i64,
    pub runtime_lookup: RuntimeLookup,
    pub seven_zip: String,
    pub packages_dir: PathBuf,
    pub windows: WindowsToolchain,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    #[serde(default)]
    package: PackageToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageToml {
    product: Option<String>,
    version: Option<String>,
    compression_level: Option<i64>,
    runtime_lookup: Option<RuntimeLookup>,
    seven_zip: Option<String>,
    packages_dir: Option<String>,
    #[serde(default)]
    windows: WindowsToml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowsToml {
    vs_install_dir: Option<String>,
    ucrt_redist_dir: Option<String>,
}

impl PackageConfig {
    /// Load the configuration for the project rooted at `project_root`.
    pub fn load(
        project_root: &Path,
        host: &HostEnvironment,
        overrides: &Overrides,
    ) -> Result<Self> {
        let file = read_config_file(project_root)?;
        Self::resolve(project_root, host, overrides, file.package)
    }

    fn resolve(
        project_root: &Path,
        host: &HostEnvironment,
        overrides: &Overrides,
        file: PackageToml,
    ) -> Result<Self> {
        let mut target = host.target();
        if let Some(arch) = overrides.arch.as_deref() {
            target.arch = node_arch(arch.trim()).to_string();
        }

        let version = overrides
            .version
            .clone()
            .or_else(|| host.var(VERSION_VAR).map(str::to_string))
            .or(file.version)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                PackError::config(format!(
                    "no product version; set `version` in {}, export {} or pass --version",
                    CONFIG_FILENAME, VERSION_VAR
                ))
            })?;

        if version.contains(['/', '\\']) {
            return Err(PackError::config(format!(
                "version '{}' is not valid in a file name",
                version
            )));
        }

        let compression_level = file.compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        if !(1..=9).contains(&compression_level) {
            return Err(PackError::config(format!(
                "compression_level must be within 1..=9, got {}",
                compression_level
            )));
        }

        let product = file
            .product
            .map(|p| p.trim().to_string())
            .unwrap_or_else(|| DEFAULT_PRODUCT.to_string());
        if product.is_empty() || product.contains(['/', '\\']) {
            return Err(PackError::config(format!(
                "product name '{}' is not a valid file name",
                product
            )));
        }

        let packages_dir = resolve_project_path(
            project_root,
            file.packages_dir.as_deref().unwrap_or(DEFAULT_PACKAGES_DIR),
        );

        let vs_install_dir = host
            .var(VS_INSTALL_VAR)
            .map(PathBuf::from)
            .or_else(|| file.windows.vs_install_dir.map(PathBuf::from));

        Ok(Self {
            project_root: project_root.to_path_buf(),
            product,
            version,
            target,
            compression_level,
            runtime_lookup: file.runtime_lookup.unwrap_or_default(),
            seven_zip: file
                .seven_zip
                .unwrap_or_else(|| DEFAULT_SEVEN_ZIP.to_string()),
            packages_dir,
            windows: WindowsToolchain {
                vs_install_dir,
                ucrt_redist_dir: file
                    .windows
                    .ucrt_redist_dir
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_UCRT_REDIST_DIR)),
            },
        })
    }

    /// `<product>-v<version>-<os>-<arch>`
    pub fn archive_stem(&self) -> String {
        format!("{}-v{}-{}", self.product, self.version, self.target.slug())
    }

    /// Path of the primary `.zip` package.
    pub fn primary_archive(&self) -> PathBuf {
        self.packages_dir.join(format!("{}.zip", self.archive_stem()))
    }
}

/// The secondary compression tool configured for `project_root`.
///
/// Unlike [`PackageConfig::load`] this needs no product version, so it can
/// serve commands that only recompress an existing archive.
pub fn configured_seven_zip(project_root: &Path) -> Result<String> {
    Ok(read_config_file(project_root)?
        .package
        .seven_zip
        .unwrap_or_else(|| DEFAULT_SEVEN_ZIP.to_string()))
}

fn read_config_file(project_root: &Path) -> Result<ConfigToml> {
    let config_path = project_root.join(CONFIG_FILENAME);
    if !config_path.is_file() {
        return Ok(ConfigToml::default());
    }
    let raw = fs::read_to_string(&config_path).map_err(|e| PackError::io(&config_path, e))?;
    toml::from_str(&raw)
        .map_err(|e| PackError::config(format!("parsing '{}': {}", config_path.display(), e)))
}

fn resolve_project_path(project_root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        project_root.join(candidate)
    }
}
