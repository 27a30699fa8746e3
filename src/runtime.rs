//! Runtime library resolution.
//!
//! The node shared library carries its module ABI version in the file name on
//! macOS (`libnode.<v>.dylib`) and other POSIX systems (`libnode.so.<v>`).
//! The version either comes from the runtime's own build metadata or from
//! whatever the build directory actually contains.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RuntimeLookup;
use crate::error::{PackError, Result};
use crate::platform::{PlatformFamily, PlatformTarget};

/// Header in the node source tree defining `NODE_MODULE_VERSION`.
pub const MODULE_VERSION_HEADER: &str = "src/node_version.h";

const MODULE_VERSION_DEFINE: &str = "NODE_MODULE_VERSION";
const LIBRARY_PREFIX: &str = "libnode.";

/// The runtime shared library chosen for the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLibrary {
    /// File name as it must appear in the package.
    pub file_name: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Module ABI version, when the name carries one.
    pub module_version: Option<u32>,
}

/// Directory (relative to the runtime root) holding the built library.
pub fn library_dir(family: PlatformFamily) -> &'static str {
    match family {
        PlatformFamily::Windows => "Release",
        PlatformFamily::MacOs => "out/Release",
        PlatformFamily::Posix => "out/Release/lib.target",
    }
}

/// Library file name for a known module version.
pub fn versioned_file_name(family: PlatformFamily, module_version: u32) -> String {
    match family {
        PlatformFamily::Windows => "node.dll".to_string(),
        PlatformFamily::MacOs => format!("libnode.{}.dylib", module_version),
        PlatformFamily::Posix => format!("libnode.so.{}", module_version),
    }
}

/// Resolve the runtime library under `runtime_root` for `target`.
///
/// Fails when the version metadata is unreadable, nothing matches the
/// platform's naming convention, or the resolved file is absent.
pub fn resolve_runtime_library(
    runtime_root: &Path,
    target: &PlatformTarget,
    lookup: RuntimeLookup,
) -> Result<RuntimeLibrary> {
    let family = target.family();
    let dir = runtime_root.join(library_dir(family));

    let (file_name, module_version) = match (family, lookup) {
        (PlatformFamily::Windows, _) => ("node.dll".to_string(), None),
        (_, RuntimeLookup::ModuleVersion) => {
            let version = read_module_version(runtime_root)?;
            (versioned_file_name(family, version), Some(version))
        }
        (_, RuntimeLookup::Discover) => {
            let name = discover_library(&dir)?;
            let version = module_version_from_name(&name);
            (name, version)
        }
    };

    let path = dir.join(&file_name);
    if !path.is_file() {
        return Err(PackError::resolution(
            &path,
            format!("runtime library for {} does not exist", target),
        ));
    }

    tracing::debug!(library = %path.display(), ?module_version, "resolved runtime library");

    Ok(RuntimeLibrary {
        file_name,
        path,
        module_version,
    })
}

/// Read `NODE_MODULE_VERSION` from the runtime's version header.
pub fn read_module_version(runtime_root: &Path) -> Result<u32> {
    let header = runtime_root.join(MODULE_VERSION_HEADER);
    let contents = fs::read_to_string(&header).map_err(|e| {
        PackError::resolution(&header, format!("reading module version metadata: {}", e))
    })?;

    parse_module_version(&contents).ok_or_else(|| {
        PackError::resolution(
            &header,
            format!("no numeric `#define {}` found", MODULE_VERSION_DEFINE),
        )
    })
}

fn parse_module_version(header: &str) -> Option<u32> {
    header.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some("#define"), Some(MODULE_VERSION_DEFINE), Some(value)) => value.parse().ok(),
            _ => None,
        }
    })
}

/// Pick the first `libnode.*` file in `dir`, by name.
fn discover_library(dir: &Path) -> Result<String> {
    let entries = fs::read_dir(dir)
        .map_err(|e| PackError::resolution(dir, format!("listing runtime output: {}", e)))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| PackError::resolution(dir, format!("listing runtime output: {}", e)))?;
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(LIBRARY_PREFIX) {
                candidates.push(name.to_string());
            }
        }
    }
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        PackError::resolution(dir, format!("no file starting with '{}'", LIBRARY_PREFIX))
    })
}

/// `libnode.so.72` → 72, `libnode.72.dylib` → 72.
fn module_version_from_name(name: &str) -> Option<u32> {
    let rest = name.strip_prefix(LIBRARY_PREFIX)?;
    rest.split('.').find_map(|part| part.parse().ok())
}
