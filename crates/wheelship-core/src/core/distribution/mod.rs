//! Locating and summarizing the release artifacts in `dist/`.

mod artifacts;

pub(crate) use artifacts::{
    find_sdist, find_single_wheel, format_bytes, is_release_artifact, relative_path_str,
    summarize_artifact, ArtifactSummary, WheelQuery,
};
