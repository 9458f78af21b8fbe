use anyhow::Result;
use serde_json::json;
use tracing::info;
use wheelship_domain::{write_manifest, ManifestReport, CYTHON_SOURCE_CLASSES};

use super::plan::ReleasePlan;
use crate::ReleaseError;

/// Rewrites `MANIFEST.in` from the `.pxd`/`.pyx` files under the package.
pub(super) fn regenerate(plan: &ReleasePlan) -> Result<ManifestReport> {
    let scan_dir = plan.root.join(&plan.scan_dir);
    if !scan_dir.is_dir() {
        return Err(ReleaseError::precondition(
            format!("package sources not found at {}", scan_dir.display()),
            json!({
                "reason": "sources_missing",
                "scan_dir": scan_dir.display().to_string(),
                "hint": "pass --package or set WHEELSHIP_PACKAGE",
            }),
        )
        .into());
    }
    let report = write_manifest(&plan.root, &plan.scan_dir, &CYTHON_SOURCE_CLASSES)?;
    for class in &CYTHON_SOURCE_CLASSES {
        info!(
            class = class.label,
            files = report.count(class.label),
            "manifest entries"
        );
    }
    Ok(report)
}
