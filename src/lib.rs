//! Packaging pipeline for launchui applications.
//!
//! Takes a compiled `launchui` executable, the node runtime and libui it was
//! built against, and the bundled JavaScript modules, and produces
//! distributable per-platform archives:
//!
//! - **Runtime resolution** - version-qualified runtime library name
//! - **Layouts** - per-platform archive structure and file set
//! - **Archives** - primary `.zip` and optional `.7z` re-compression
//! - **Orchestration** - the staged pipeline driving all of the above
//!
//! # Architecture
//!
//! ```text
//! Packager (package)
//!     │
//!     ├── runtime::resolve_runtime_library   ResolveVersions
//!     ├── layout::plan_entries               BuildFileList
//!     │       └── Windows | MacOs | Posix  + common entries
//!     ├── ArchiveSink::start → wait          WriteArchive
//!     └── SecondaryCompressor::recompress    Compress | Skip
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use launchui_pack::{HostEnvironment, Overrides, PackageConfig, Packager, SevenZip, ZipArchiveBuilder};
//!
//! let host = HostEnvironment::capture();
//! let config = PackageConfig::load(Path::new("."), &host, &Overrides::default())?;
//! let compressor = SevenZip::new(&config.seven_zip);
//! let descriptor = Packager::new(&config, &ZipArchiveBuilder, &compressor).run()?;
//! println!("{}", descriptor.primary_path().display());
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod layout;
pub mod package;
pub mod platform;
pub mod process;
pub mod runtime;

pub use archive::seven_zip::SevenZip;
pub use archive::zip_writer::ZipArchiveBuilder;
pub use archive::{ArchiveReport, ArchiveRequest, ArchiveSink, PendingArchive, SecondaryCompressor};
pub use config::{Overrides, PackageConfig};
pub use error::{PackError, PipelineFailure};
pub use layout::{ArchiveEntry, ArtifactRole, BuildArtifact};
pub use package::{recompress_existing, PackageDescriptor, Packager, SecondaryArchive, Stage};
pub use platform::{HostEnvironment, PlatformFamily, PlatformTarget};
