use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::{ensure_success, plan::ReleasePlan};
use crate::distribution::is_release_artifact;
use crate::effects::{ContainerRuntime, FileSystem, HeadState, VersionControl};
use crate::process::render_command;
use crate::ReleaseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ImageStatus {
    Present,
    Pulled,
}

pub(super) fn ensure_project_dir(plan: &ReleasePlan) -> Result<()> {
    if plan.root.is_dir() {
        return Ok(());
    }
    Err(ReleaseError::precondition(
        format!("project directory {} is not accessible", plan.root.display()),
        json!({
            "reason": "project_missing",
            "project": plan.root.display().to_string(),
            "hint": "pass --project or set WHEELSHIP_PROJECT_ROOT",
        }),
    )
    .into())
}

/// The checkout must sit on `dev-<version>`; anything else, including a
/// detached HEAD, stops the release before anything is built.
pub(super) fn verify_branch(git: &dyn VersionControl, plan: &ReleasePlan) -> Result<HeadState> {
    let expected = plan.version.branch_name();
    let head = git.head(&plan.root).map_err(|err| {
        ReleaseError::precondition(
            format!(
                "cannot read the current branch of {}: {err:#}",
                plan.root.display()
            ),
            json!({
                "reason": "head_unreadable",
                "project": plan.root.display().to_string(),
                "expected_branch": expected,
            }),
        )
    })?;
    match &head {
        HeadState::Branch(name) if plan.version.is_release_branch(name) => {
            info!(branch = %name, "on release branch");
            Ok(head)
        }
        HeadState::Branch(name) => Err(ReleaseError::precondition(
            format!("expected to be on branch {expected}, but on {name}"),
            json!({
                "reason": "wrong_branch",
                "expected_branch": expected,
                "head": head,
                "hint": format!("git checkout {expected}"),
            }),
        )
        .into()),
        HeadState::Detached(commit) => Err(ReleaseError::precondition(
            format!("expected to be on branch {expected}, but HEAD is detached at {commit}"),
            json!({
                "reason": "wrong_branch",
                "expected_branch": expected,
                "head": head,
                "hint": format!("git checkout {expected}"),
            }),
        )
        .into()),
    }
}

/// Pulls the repair image only when the local store lacks it.
pub(super) fn ensure_image(containers: &dyn ContainerRuntime, image: &str) -> Result<ImageStatus> {
    if containers.image_exists(image)? {
        info!(%image, "image present locally");
        return Ok(ImageStatus::Present);
    }
    info!(%image, "pulling image");
    let output = containers.pull(image)?;
    ensure_success(
        &output,
        "pulling the manylinux image",
        render_command(
            &containers.backend().program,
            &["pull".to_string(), image.to_string()],
        ),
    )?;
    Ok(ImageStatus::Pulled)
}

/// Removes artifacts of this version left by an earlier run, plus any
/// leftover wheelhouse, so discovery only ever sees fresh output.
pub(super) fn clean_stale_artifacts(fs: &dyn FileSystem, plan: &ReleasePlan) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    if plan.dist_dir.is_dir() {
        for name in fs.list_dir(&plan.dist_dir)? {
            if is_release_artifact(&name, &plan.package, &plan.version) {
                fs.remove_file(&plan.dist_dir.join(&name))?;
                removed.push(format!("dist/{name}"));
            }
        }
    }
    if plan.wheelhouse_dir.exists() {
        fs.remove_dir_all(&plan.wheelhouse_dir)?;
        removed.push("wheelhouse/".to_string());
    }
    if !removed.is_empty() {
        warn!(removed = ?removed, "removed stale artifacts from an earlier run");
    }
    Ok(removed)
}
