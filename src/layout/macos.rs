//! `launchui.app` bundle layout for macOS.
//!
//! ```text
//! launchui.app/Contents/Info.plist
//! launchui.app/Contents/MacOS/{launchui, libnode.<v>.dylib, libui.A.dylib}
//! launchui.app/Contents/Resources/{launchui.icns, node_modules/, app/}
//! ```
//!
//! Licenses stay at the archive root, next to the bundle.

use super::{require, ArtifactRole, BuildArtifact, LayoutInputs, LayoutStrategy, APP_NAME};
use crate::error::Result;
use crate::platform::PlatformFamily;

const CONTENTS_DIR: &str = "launchui.app/Contents/";
const MACOS_DIR: &str = "launchui.app/Contents/MacOS/";
const RESOURCES_DIR: &str = "launchui.app/Contents/Resources/";

const UI_LIBRARY: &str = "libui.A.dylib";
const ICON: &str = "launchui.icns";

pub struct MacOsLayout;

impl LayoutStrategy for MacOsLayout {
    fn family(&self) -> PlatformFamily {
        PlatformFamily::MacOs
    }

    fn platform_artifacts(&self, inputs: &LayoutInputs<'_>) -> Result<Vec<BuildArtifact>> {
        let root = inputs.project_root;
        Ok(vec![
            require(
                root.join("src/Info.plist"),
                ArtifactRole::Metadata,
                "Info.plist",
            )?,
            require(root.join("build").join(APP_NAME), ArtifactRole::Executable, APP_NAME)?,
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
            require(root.join("src").join(ICON), ArtifactRole::Resource, ICON)?,
        ])
    }

    fn module_prefix(&self) -> &'static str {
        RESOURCES_DIR
    }

    fn destination(&self, artifact: &BuildArtifact) -> String {
        match artifact.role {
            ArtifactRole::Metadata => format!("{}{}", CONTENTS_DIR, artifact.name),
            ArtifactRole::Executable | ArtifactRole::RuntimeLibrary | ArtifactRole::UiLibrary => {
                format!("{}{}", MACOS_DIR, artifact.name)
            }
            ArtifactRole::Resource | ArtifactRole::BundledModule | ArtifactRole::EntryPoint => {
                format!("{}{}", RESOURCES_DIR, artifact.name)
            }
            ArtifactRole::License | ArtifactRole::Redistributable => artifact.name.clone(),
        }
    }
}
