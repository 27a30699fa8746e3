//! Flat layout for Windows.
//!
//! Besides the executable and the two DLLs it links against, the package
//! carries the MSVC C++ runtime from the Visual Studio installation and the
//! Universal CRT redistributables, matched to the target architecture.

use std::fs;
use std::path::{Path, PathBuf};

use super::{require, ArtifactRole, BuildArtifact, LayoutInputs, LayoutStrategy};
use crate::error::{PackError, Result};
use crate::platform::PlatformFamily;

const EXECUTABLE: &str = "launchui.exe";
const UI_LIBRARY: &str = "libui.dll";
const MSVC_RUNTIME: &[&str] = &["msvcp140.dll", "vcruntime140.dll"];
const TOOLS_VERSION_FILE: &str = "VC/Auxiliary/Build/Microsoft.VCToolsVersion.default.txt";

/// Architecture-specific redistributable directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedistArch {
    /// `bin/` subdirectory of the MSVC tools.
    pub vc_tools: &'static str,
    /// Subdirectory of the UCRT redist root.
    pub ucrt: &'static str,
}

/// Redistributable directories for a node architecture name.
pub fn redist_arch(arch: &str) -> Option<RedistArch> {
    match arch {
        "ia32" => Some(RedistArch {
            vc_tools: "HostX86/x86",
            ucrt: "x86",
        }),
        "x64" => Some(RedistArch {
            vc_tools: "HostX64/x64",
            ucrt: "x64",
        }),
        _ => None,
    }
}

pub struct WindowsLayout;

impl LayoutStrategy for WindowsLayout {
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Windows
    }

    fn platform_artifacts(&self, inputs: &LayoutInputs<'_>) -> Result<Vec<BuildArtifact>> {
        let target = inputs.target;
        let arch = redist_arch(&target.arch).ok_or_else(|| PackError::UnsupportedArchitecture {
            os: target.os.clone(),
            arch: target.arch.clone(),
        })?;

        let root = inputs.project_root;
        let mut artifacts = vec![
            require(
                root.join("build").join(EXECUTABLE),
                ArtifactRole::Executable,
                EXECUTABLE,
            )?,
            require(
                inputs.runtime.path.clone(),
                ArtifactRole::RuntimeLibrary,
                inputs.runtime.file_name.as_str(),
            )?,
            require(
                root.join("deps/libui/build/out").join(UI_LIBRARY),
                ArtifactRole::UiLibrary,
                UI_LIBRARY,
            )?,
        ];

        let vc_tools_dir = vc_tools_dir(inputs.windows.vs_install_dir.as_deref(), arch)?;
        for dll in MSVC_RUNTIME {
            artifacts.push(require(
                vc_tools_dir.join(dll),
                ArtifactRole::Redistributable,
                *dll,
            )?);
        }

        let ucrt_dir = inputs.windows.ucrt_redist_dir.join(arch.ucrt);
        for dll in dlls_in(&ucrt_dir)? {
            artifacts.push(BuildArtifact::new(
                ucrt_dir.join(&dll),
                ArtifactRole::Redistributable,
                dll,
            ));
        }

        Ok(artifacts)
    }
}

/// `<vs>/VC/Tools/MSVC/<default tools version>/bin/<host>/<target>`
fn vc_tools_dir(vs_install_dir: Option<&Path>, arch: RedistArch) -> Result<PathBuf> {
    let Some(vs) = vs_install_dir else {
        return Err(PackError::MissingArtifact {
            role: ArtifactRole::Redistributable,
            path: PathBuf::from(TOOLS_VERSION_FILE),
        });
    };

    let version_file = vs.join(TOOLS_VERSION_FILE);
    let version = fs::read_to_string(&version_file).map_err(|_| PackError::MissingArtifact {
        role: ArtifactRole::Redistributable,
        path: version_file.clone(),
    })?;
    let version = version.trim();
    if version.is_empty() {
        return Err(PackError::MissingArtifact {
            role: ArtifactRole::Redistributable,
            path: version_file,
        });
    }

    Ok(vs
        .join("VC/Tools/MSVC")
        .join(version)
        .join("bin")
        .join(arch.vc_tools))
}

/// Names of the `*.dll` files directly inside `dir`, sorted.
///
/// A missing directory yields nothing.
fn dlls_in(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PackError::io(dir, e))? {
        let entry = entry.map_err(|e| PackError::io(dir, e))?;
        if !entry.file_type().map_err(|e| PackError::io(entry.path(), e))?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.to_ascii_lowercase().ends_with(".dll") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowsToolchain;
    use crate::layout::fixtures::write_windows;
    use crate::platform::PlatformTarget;
    use crate::runtime::RuntimeLibrary;
    use tempfile::TempDir;

    fn entries_for(root: &Path, arch: &str, windows: &WindowsToolchain) -> Result<Vec<String>> {
        let target = PlatformTarget::new("win32", arch);
        let runtime = RuntimeLibrary {
            file_name: "node.dll".into(),
            path: root.join("deps/node/Release/node.dll"),
            module_version: None,
        };
        let inputs = LayoutInputs {
            project_root: root,
            target: &target,
            runtime: &runtime,
            windows,
        };
        let artifacts = WindowsLayout.discover(&inputs)?;
        Ok(WindowsLayout
            .entries(&artifacts)?
            .into_iter()
            .map(|e| e.destination)
            .collect())
    }

    #[test]
    fn flat_layout_with_redistributables() {
        let temp = TempDir::new().unwrap();
        let windows = write_windows(temp.path());

        let destinations = entries_for(temp.path(), "x64", &windows).unwrap();

        assert_eq!(
            &destinations[..7],
            &[
                "launchui.exe",
                "node.dll",
                "libui.dll",
                "msvcp140.dll",
                "vcruntime140.dll",
                "api-ms-win-crt-runtime-l1-1-0.dll",
                "ucrtbase.dll",
            ]
        );
        assert!(!destinations.iter().any(|d| d == "README.txt"));
        assert!(destinations.iter().any(|d| d == "LICENSE.launchui"));
    }

    #[test]
    fn ia32_uses_x86_redistributables() {
        let temp = TempDir::new().unwrap();
        let windows = write_windows(temp.path());
        let target = PlatformTarget::new("win32", "ia32");
        let runtime = RuntimeLibrary {
            file_name: "node.dll".into(),
            path: temp.path().join("deps/node/Release/node.dll"),
            module_version: None,
        };
        let inputs = LayoutInputs {
            project_root: temp.path(),
            target: &target,
            runtime: &runtime,
            windows: &windows,
        };

        let artifacts = WindowsLayout.platform_artifacts(&inputs).unwrap();
        let msvcp = artifacts.iter().find(|a| a.name == "msvcp140.dll").unwrap();
        assert!(msvcp.source.ends_with("HostX86/x86/msvcp140.dll"));
        let ucrt = artifacts.iter().find(|a| a.name == "ucrtbase.dll").unwrap();
        assert!(ucrt.source.ends_with("x86/ucrtbase.dll"));
    }

    #[test]
    fn missing_ucrt_dir_yields_no_entries() {
        let temp = TempDir::new().unwrap();
        let mut windows = write_windows(temp.path());
        windows.ucrt_redist_dir = temp.path().join("no-such-ucrt");

        let destinations = entries_for(temp.path(), "x64", &windows).unwrap();
        assert!(!destinations.iter().any(|d| d == "ucrtbase.dll"));
    }

    #[test]
    fn unknown_arch_is_rejected() {
        let temp = TempDir::new().unwrap();
        let windows = write_windows(temp.path());

        let err = entries_for(temp.path(), "arm64", &windows).unwrap_err();
        assert!(matches!(err, PackError::UnsupportedArchitecture { .. }));
    }

    #[test]
    fn missing_visual_studio_fails_fast() {
        let temp = TempDir::new().unwrap();
        let mut windows = write_windows(temp.path());
        windows.vs_install_dir = None;

        let err = entries_for(temp.path(), "x64", &windows).unwrap_err();
        assert!(matches!(
            err,
            PackError::MissingArtifact {
                role: ArtifactRole::Redistributable,
                ..
            }
        ));
    }
}
