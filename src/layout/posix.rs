//! Flat layout for Linux and other POSIX targets.

use super::{require, ArtifactRole, BuildArtifact, LayoutInputs, LayoutStrategy, APP_NAME};
use crate::error::Result;
use crate::platform::PlatformFamily;

const UI_LIBRARY: &str = "libui.so.0";

/// Executable and versioned shared objects at the archive root.
pub struct PosixLayout;

impl LayoutStrategy for PosixLayout {
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Posix
    }

    fn platform_artifacts(&self, inputs: &LayoutInputs<'_>) -> Result<Vec<BuildArtifact>> {
        let root = inputs.project_root;
        Ok(vec![
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
        ])
    }
}
