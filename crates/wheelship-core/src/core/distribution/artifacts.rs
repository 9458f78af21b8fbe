use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use wheelship_domain::{sdist_filename, AbiTag, ReleaseVersion, WheelFilename};

use crate::effects::FileSystem;
use crate::ReleaseError;

#[derive(Clone, Debug, Serialize)]
pub(crate) struct ArtifactSummary {
    pub path: String,
    pub bytes: u64,
    pub sha256: String,
}

pub(crate) fn summarize_artifact(path: &Path, root: &Path) -> Result<ArtifactSummary> {
    let bytes = fs::metadata(path)?.len();
    let sha256 = compute_file_sha256(path)?;
    Ok(ArtifactSummary {
        path: relative_path_str(path, root),
        bytes,
        sha256,
    })
}

pub(crate) fn compute_file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    fn format_scaled(value: u64, unit: u64, suffix: &str) -> String {
        let whole = value / unit;
        let remainder = value % unit;
        let tenths = (remainder * 10) / unit;
        format!("{whole}.{tenths} {suffix}")
    }

    if bytes >= MB {
        format_scaled(bytes, MB, "MB")
    } else if bytes >= KB {
        format_scaled(bytes, KB, "KB")
    } else {
        format!("{bytes} B")
    }
}

pub(crate) fn relative_path_str(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// What a wheel lookup expects to find.
pub(crate) struct WheelQuery<'a> {
    pub package: &'a str,
    pub version: &'a ReleaseVersion,
    pub abi: AbiTag,
    pub platform: fn(&str) -> bool,
    /// The filename the toolchain is expected to produce, reported when
    /// discovery fails.
    pub predicted: &'a WheelFilename,
}

/// Finds exactly one wheel in `dir` matching the query.
///
/// Listing the directory instead of trusting the predicted name means a
/// toolchain that spells the platform tag differently still works, while
/// a missing or ambiguous artifact stops the release with the candidates named.
pub(crate) fn find_single_wheel(
    fs: &dyn FileSystem,
    dir: &Path,
    query: &WheelQuery<'_>,
) -> Result<(PathBuf, WheelFilename)> {
    let names = fs.list_dir(dir)?;
    let mut matches = Vec::new();
    for name in &names {
        let Ok(parsed) = WheelFilename::parse(name) else {
            continue;
        };
        if parsed.matches(query.package, query.version, query.abi)
            && (query.platform)(&parsed.platform_tag)
        {
            matches.push(parsed);
        }
    }
    match matches.len() {
        1 => {
            let wheel = matches.remove(0);
            if wheel != *query.predicted {
                tracing::warn!(
                    found = %wheel,
                    predicted = %query.predicted,
                    "wheel name differs from the predicted name; using the discovered file"
                );
            }
            Ok((dir.join(wheel.to_string()), wheel))
        }
        0 => Err(ReleaseError::tool(
            format!(
                "no wheel matching {} found in {}",
                query.predicted,
                dir.display()
            ),
            json!({
                "reason": "wheel_missing",
                "predicted": query.predicted.to_string(),
                "dir": dir.display().to_string(),
                "found": names,
            }),
        )
        .into()),
        count => Err(ReleaseError::tool(
            format!(
                "{count} wheels match {} in {}; remove the stale ones",
                query.predicted,
                dir.display()
            ),
            json!({
                "reason": "wheel_ambiguous",
                "predicted": query.predicted.to_string(),
                "dir": dir.display().to_string(),
                "candidates": matches.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }),
        )
        .into()),
    }
}

/// Finds the source distribution, accepting the normalized spelling newer
/// setuptools releases write.
pub(crate) fn find_sdist(
    fs: &dyn FileSystem,
    dir: &Path,
    package: &str,
    version: &ReleaseVersion,
) -> Result<PathBuf> {
    let predicted = sdist_filename(package, version);
    let names = fs.list_dir(dir)?;
    if names.iter().any(|name| *name == predicted) {
        return Ok(dir.join(predicted));
    }
    let wanted = normalize_stem(&format!("{package}-{version}"));
    let candidates: Vec<&String> = names
        .iter()
        .filter(|name| {
            name.strip_suffix(".tar.gz")
                .is_some_and(|stem| normalize_stem(stem) == wanted)
        })
        .collect();
    if let [only] = candidates.as_slice() {
        tracing::warn!(found = %only, %predicted, "sdist name differs from the predicted name");
        return Ok(dir.join(only.as_str()));
    }
    Err(ReleaseError::tool(
        format!("source distribution {predicted} not found in {}", dir.display()),
        json!({
            "reason": "sdist_missing",
            "predicted": predicted,
            "dir": dir.display().to_string(),
            "found": names,
        }),
    )
    .into())
}

/// Whether a `dist/` entry belongs to `package` at `version`.
pub(crate) fn is_release_artifact(name: &str, package: &str, version: &ReleaseVersion) -> bool {
    if let Ok(wheel) = WheelFilename::parse(name) {
        return normalize_stem(&wheel.distribution) == normalize_stem(package)
            && wheel.version == version.as_str();
    }
    name.strip_suffix(".tar.gz").is_some_and(|stem| {
        normalize_stem(stem) == normalize_stem(&format!("{package}-{version}"))
    })
}

fn normalize_stem(stem: &str) -> String {
    stem.to_ascii_lowercase().replace(['-', '.'], "_")
}
