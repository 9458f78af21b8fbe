//! `MANIFEST.in` generation for Cython sources.
//!
//! setuptools only ships `.pxd`/`.pyx` files in the sdist when the manifest
//! names them, so the manifest is regenerated on every release.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

pub const MANIFEST_FILENAME: &str = "MANIFEST.in";

/// A class of source files picked up by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceClass {
    pub label: &'static str,
    pub extension: &'static str,
}

/// Interface definitions first, implementation sources second.
pub const CYTHON_SOURCE_CLASSES: [SourceClass; 2] = [
    SourceClass {
        label: "interface",
        extension: "pxd",
    },
    SourceClass {
        label: "implementation",
        extension: "pyx",
    },
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub class: &'static str,
    pub path: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ManifestReport {
    pub path: PathBuf,
    pub entries: Vec<ManifestEntry>,
}

impl ManifestReport {
    pub fn count(&self, class: &str) -> usize {
        self.entries.iter().filter(|e| e.class == class).count()
    }
}

/// Walks `root/scan_dir` once per class and returns the matches, grouped by
/// class in the order given. Paths are relative to `root` with `/` separators.
pub fn collect_manifest_entries(
    root: &Path,
    scan_dir: &Path,
    classes: &[SourceClass],
) -> Result<Vec<ManifestEntry>> {
    let base = root.join(scan_dir);
    if !base.is_dir() {
        bail!("manifest source directory {} does not exist", base.display());
    }
    let mut entries = Vec::new();
    for class in classes {
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", base.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(class.extension) {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            entries.push(ManifestEntry {
                class: class.label,
                path: relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            });
        }
    }
    Ok(entries)
}

pub fn render_manifest(entries: &[ManifestEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str("include ");
        out.push_str(&entry.path);
        out.push('\n');
    }
    out
}

/// Regenerates `root/MANIFEST.in`, replacing any previous contents.
pub fn write_manifest(
    root: &Path,
    scan_dir: &Path,
    classes: &[SourceClass],
) -> Result<ManifestReport> {
    let entries = collect_manifest_entries(root, scan_dir, classes)?;
    let path = root.join(MANIFEST_FILENAME);
    fs::write(&path, render_manifest(&entries))
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "wrote manifest");
    Ok(ManifestReport { path, entries })
}
