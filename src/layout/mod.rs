//! Platform layout strategies.
//!
//! Each platform family decides which build outputs go into the package and
//! where they land inside the archive:
//!
//! - [`windows`] - flat layout with MSVC and UCRT redistributables
//! - [`macos`] - `launchui.app` bundle
//! - [`posix`] - flat layout with versioned shared objects
//!
//! All of them append the [`common`] entries: licenses, bundled node modules
//! and the application entry point.
//!
//! Layouts work in two steps. [`LayoutStrategy::discover`] checks the inputs on
//! disk and fails fast on anything required that is missing.
//! [`LayoutStrategy::entries`] is then a pure mapping from artifacts to archive
//! paths, so every family can be exercised on any host.

pub mod common;
pub mod macos;
pub mod posix;
pub mod windows;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::WindowsToolchain;
use crate::error::{PackError, Result};
use crate::platform::{PlatformFamily, PlatformTarget};
use crate::runtime::RuntimeLibrary;

/// Name of the launched application's binary and bundle.
pub const APP_NAME: &str = "launchui";

/// What a build artifact is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactRole {
    Executable,
    RuntimeLibrary,
    UiLibrary,
    /// Toolchain runtime DLLs shipped next to the executable.
    Redistributable,
    License,
    BundledModule,
    /// Application entry script loaded by the executable.
    EntryPoint,
    /// Bundle metadata such as `Info.plist`.
    Metadata,
    /// Bundle resources such as the icon.
    Resource,
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactRole::Executable => "executable",
            ArtifactRole::RuntimeLibrary => "runtime library",
            ArtifactRole::UiLibrary => "ui library",
            ArtifactRole::Redistributable => "redistributable",
            ArtifactRole::License => "license",
            ArtifactRole::BundledModule => "bundled module file",
            ArtifactRole::EntryPoint => "entry point",
            ArtifactRole::Metadata => "bundle metadata",
            ArtifactRole::Resource => "bundle resource",
        };
        f.write_str(name)
    }
}

/// A file discovered on disk that belongs in the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub source: PathBuf,
    pub role: ArtifactRole,
    /// Name relative to the area its role is placed in, `/`-separated.
    pub name: String,
}

impl BuildArtifact {
    pub fn new(source: impl Into<PathBuf>, role: ArtifactRole, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            role,
            name: name.into(),
        }
    }
}

/// A file placed at `destination` inside the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub source: PathBuf,
    pub destination: String,
}

/// Everything a layout needs to know to discover its artifacts.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInputs<'a> {
    pub project_root: &'a Path,
    pub target: &'a PlatformTarget,
    pub runtime: &'a RuntimeLibrary,
    pub windows: &'a WindowsToolchain,
}

/// Directory-structure and file-set rules for one platform family.
pub trait LayoutStrategy: Sync {
    fn family(&self) -> PlatformFamily;

    /// Platform-specific artifacts, in archive order.
    fn platform_artifacts(&self, inputs: &LayoutInputs<'_>) -> Result<Vec<BuildArtifact>>;

    /// Directory bundled modules and the entry point are placed under.
    fn module_prefix(&self) -> &'static str {
        ""
    }

    /// Destination of `artifact` inside the archive.
    fn destination(&self, artifact: &BuildArtifact) -> String {
        match artifact.role {
            ArtifactRole::BundledModule | ArtifactRole::EntryPoint => {
                format!("{}{}", self.module_prefix(), artifact.name)
            }
            _ => artifact.name.clone(),
        }
    }

    /// All artifacts for this platform: its own, then the common ones.
    fn discover(&self, inputs: &LayoutInputs<'_>) -> Result<Vec<BuildArtifact>> {
        let mut artifacts = self.platform_artifacts(inputs)?;
        artifacts.extend(common::common_artifacts(inputs.project_root)?);
        Ok(artifacts)
    }

    /// Map artifacts to archive entries, preserving order.
    fn entries(&self, artifacts: &[BuildArtifact]) -> Result<Vec<ArchiveEntry>> {
        let entries: Vec<ArchiveEntry> = artifacts
            .iter()
            .map(|artifact| ArchiveEntry {
                source: artifact.source.clone(),
                destination: self.destination(artifact),
            })
            .collect();
        ensure_unique_destinations(&entries)?;
        Ok(entries)
    }
}

/// The strategy for a platform family.
pub fn strategy_for(family: PlatformFamily) -> &'static dyn LayoutStrategy {
    match family {
        PlatformFamily::Windows => &windows::WindowsLayout,
        PlatformFamily::MacOs => &macos::MacOsLayout,
        PlatformFamily::Posix => &posix::PosixLayout,
    }
}

/// Discover and place every file of the package for `inputs.target`.
pub fn plan_entries(inputs: &LayoutInputs<'_>) -> Result<Vec<ArchiveEntry>> {
    let strategy = strategy_for(inputs.target.family());
    let artifacts = strategy.discover(inputs)?;
    strategy.entries(&artifacts)
}

/// Reject entry lists where two sources share a destination.
pub fn ensure_unique_destinations(entries: &[ArchiveEntry]) -> Result<()> {
    let mut seen: HashMap<&str, &Path> = HashMap::with_capacity(entries.len());
    for entry in entries {
        if let Some(first) = seen.insert(&entry.destination, &entry.source) {
            return Err(PackError::DuplicateEntry {
                destination: entry.destination.clone(),
                first: first.to_path_buf(),
                second: entry.source.clone(),
            });
        }
    }
    Ok(())
}

/// A single file the package cannot ship without.
pub(crate) fn require(
    source: PathBuf,
    role: ArtifactRole,
    name: impl Into<String>,
) -> Result<BuildArtifact> {
    if !source.is_file() {
        return Err(PackError::MissingArtifact { role, path: source });
    }
    Ok(BuildArtifact::new(source, role, name))
}
