//! Entries shared by every platform layout.
//!
//! Licenses land at the archive root as `LICENSE.<dependency>`. The bundled
//! node modules and the application entry point are named relative to the
//! layout's module prefix.

use std::path::Path;
use walkdir::WalkDir;

use super::{require, ArtifactRole, BuildArtifact};
use crate::error::{PackError, Result};

/// `(source relative to the project root, archive name)`
const LICENSES: &[(&str, &str)] = &[
    ("deps/node/LICENSE", "LICENSE.node"),
    ("deps/libui/LICENSE", "LICENSE.libui"),
    ("LICENSE", "LICENSE.launchui"),
];

/// A third-party module copied verbatim into `node_modules/`.
struct BundledModule {
    /// Module name as it appears under `node_modules/`.
    name: &'static str,
    /// Source directory relative to the project root.
    source_dir: &'static str,
    files: &'static [&'static str],
    /// Also ship every `*.js` file below the module directory.
    all_scripts: bool,
}

const BUNDLED_MODULES: &[BundledModule] = &[
    BundledModule {
        name: "libui-node",
        source_dir: "deps/libui-node",
        files: &["package.json", "readme.md", "license", "index.js", "nbind.node"],
        all_scripts: false,
    },
    BundledModule {
        name: "@mischnic/async-hooks",
        source_dir: "node_modules/@mischnic/async-hooks",
        files: &["package.json", "README.md", "LICENSE"],
        all_scripts: true,
    },
    BundledModule {
        name: "es6-shim",
        source_dir: "node_modules/es6-shim",
        files: &["package.json", "README.md", "LICENSE", "es6-shim.js"],
        all_scripts: false,
    },
    BundledModule {
        name: "nbind",
        source_dir: "node_modules/nbind",
        files: &["package.json", "README.md", "LICENSE", "dist/nbind.js"],
        all_scripts: false,
    },
];

const ENTRY_POINT: &str = "app/main.js";

/// Licenses, bundled modules and the entry point, in archive order.
pub fn common_artifacts(project_root: &Path) -> Result<Vec<BuildArtifact>> {
    let mut artifacts = Vec::new();

    for (source, name) in LICENSES {
        artifacts.push(require(
            project_root.join(source),
            ArtifactRole::License,
            *name,
        )?);
    }

    for module in BUNDLED_MODULES {
        let module_dir = project_root.join(module.source_dir);
        let prefix = format!("node_modules/{}/", module.name);

        for file in module.files {
            artifacts.push(require(
                module_dir.join(file),
                ArtifactRole::BundledModule,
                format!("{}{}", prefix, file),
            )?);
        }

        if module.all_scripts {
            for script in scripts_below(&module_dir)? {
                artifacts.push(BuildArtifact::new(
                    module_dir.join(&script),
                    ArtifactRole::BundledModule,
                    format!("{}{}", prefix, script),
                ));
            }
        }
    }

    artifacts.push(require(
        project_root.join(ENTRY_POINT),
        ArtifactRole::EntryPoint,
        ENTRY_POINT,
    )?);

    Ok(artifacts)
}

/// Relative, `/`-separated paths of every `*.js` file below `dir`, sorted.
///
/// A missing directory yields nothing.
fn scripts_below(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            PackError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("js") {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        scripts.push(rel);
    }
    Ok(scripts)
}
