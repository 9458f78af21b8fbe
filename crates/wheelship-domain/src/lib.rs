#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod filename;
pub mod manifest;
pub mod tags;
pub mod version;

pub use filename::{sdist_filename, WheelFilename};
pub use manifest::{
    collect_manifest_entries, render_manifest, write_manifest, ManifestEntry, ManifestReport,
    SourceClass, CYTHON_SOURCE_CLASSES, MANIFEST_FILENAME,
};
pub use tags::{is_manylinux_platform, AbiTag, LINUX_PLATFORM, MANYLINUX_PLATFORM};
pub use version::ReleaseVersion;
