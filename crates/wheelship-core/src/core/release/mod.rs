//! The release pipeline.
//!
//! A run walks a fixed sequence of stages and stops at the first failure:
//! regenerate `MANIFEST.in`, confirm the checkout is on `dev-<version>`,
//! compile the extensions, package a wheel and sdist, repair the wheel in a
//! manylinux container, then install each artifact and run the test suite
//! against it. Nothing is uploaded; the outcome carries the `twine` command.

mod build;
mod manifest;
mod plan;
mod preflight;
mod repair;
mod verify;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use wheelship_domain::{AbiTag, ManifestReport, CYTHON_SOURCE_CLASSES};

pub use plan::ReleaseRequest;

use self::plan::ReleasePlan;
use self::preflight::ImageStatus;
use self::repair::RepairReport;
use crate::config::context::CommandContext;
use crate::distribution::{find_sdist, format_bytes, summarize_artifact, ArtifactSummary};
use crate::effects::HeadState;
use crate::process::RunOutput;
use crate::{ExecutionOutcome, ReleaseError};

const STDERR_TAIL_LINES: usize = 20;

/// Milestones of a release run, in the order they are reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStage {
    ManifestWritten,
    BranchVerified,
    Built,
    Packaged,
    ImageReady,
    Repaired,
    WheelVerified,
    SourceVerified,
    Done,
}

impl ReleaseStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseStage::ManifestWritten => "manifest_written",
            ReleaseStage::BranchVerified => "branch_verified",
            ReleaseStage::Built => "built",
            ReleaseStage::Packaged => "packaged",
            ReleaseStage::ImageReady => "image_ready",
            ReleaseStage::Repaired => "repaired",
            ReleaseStage::WheelVerified => "wheel_verified",
            ReleaseStage::SourceVerified => "source_verified",
            ReleaseStage::Done => "done",
        }
    }
}

#[derive(Debug, Default)]
struct StageLog {
    reached: Vec<ReleaseStage>,
}

impl StageLog {
    fn reach(&mut self, stage: ReleaseStage) {
        info!(stage = stage.as_str(), "stage complete");
        self.reached.push(stage);
    }

    fn last(&self) -> Option<ReleaseStage> {
        self.reached.last().copied()
    }
}

struct ReleaseReport {
    manifest: ManifestReport,
    head: HeadState,
    abi: AbiTag,
    cleaned: Vec<String>,
    image: ImageStatus,
    repair: RepairReport,
    sdist: PathBuf,
}

/// Runs the release pipeline for `request.version`.
///
/// Expected stops (wrong branch, a failing tool, a missing artifact) come
/// back as a non-success outcome; only unexpected I/O failures are `Err`.
///
/// # Errors
/// Returns an error when a command cannot be spawned or the filesystem
/// fails underneath a stage.
pub fn release(ctx: &CommandContext, request: &ReleaseRequest) -> Result<ExecutionOutcome> {
    let plan = ReleasePlan::new(ctx.config(), &request.version);
    if !request.version.is_pep440() {
        warn!(version = %request.version, "version is not PEP 440; continuing");
    }
    info!(
        version = %plan.version,
        project = %plan.root.display(),
        dry_run = request.dry_run,
        "starting release"
    );
    if request.dry_run {
        return dry_run(ctx, &plan);
    }

    let mut log = StageLog::default();
    match run_pipeline(ctx, &plan, &mut log) {
        Ok(report) => success_outcome(&plan, &log, &report),
        Err(err) => match err.downcast::<ReleaseError>() {
            Ok(stop) => Ok(stopped_outcome(&plan, &log, &stop)),
            Err(other) => Err(other.context(format!(
                "release {} stopped after {}",
                plan.version,
                log.last().map_or("start", ReleaseStage::as_str)
            ))),
        },
    }
}

fn run_pipeline(
    ctx: &CommandContext,
    plan: &ReleasePlan,
    log: &mut StageLog,
) -> Result<ReleaseReport> {
    preflight::ensure_project_dir(plan)?;
    let manifest = manifest::regenerate(plan)?;
    log.reach(ReleaseStage::ManifestWritten);

    let head = preflight::verify_branch(ctx.git(), plan)?;
    log.reach(ReleaseStage::BranchVerified);

    let python = resolve_python(ctx)?;
    let abi = ctx.python_runtime().detect_abi_tag(&python)?;
    info!(%python, abi = %abi, "interpreter ready");
    let cleaned = preflight::clean_stale_artifacts(ctx.fs(), plan)?;

    build::run_steps(ctx.python_runtime(), &python, &plan.root, &build::EXTENSION_STEPS)?;
    log.reach(ReleaseStage::Built);
    build::run_steps(ctx.python_runtime(), &python, &plan.root, &build::DISTRIBUTION_STEPS)?;
    log.reach(ReleaseStage::Packaged);

    let image = preflight::ensure_image(ctx.containers(), &plan.image)?;
    log.reach(ReleaseStage::ImageReady);
    let repair = repair::repair_wheel(ctx, plan, abi)?;
    log.reach(ReleaseStage::Repaired);

    let sdist = find_sdist(ctx.fs(), &plan.dist_dir, &plan.package, &plan.version)?;
    verify::verify_artifact(ctx, plan, &python, &repair.output, "wheel")?;
    log.reach(ReleaseStage::WheelVerified);
    verify::verify_artifact(ctx, plan, &python, &sdist, "sdist")?;
    log.reach(ReleaseStage::SourceVerified);
    log.reach(ReleaseStage::Done);

    Ok(ReleaseReport {
        manifest,
        head,
        abi,
        cleaned,
        image,
        repair,
        sdist,
    })
}

fn resolve_python(ctx: &CommandContext) -> Result<String> {
    ctx.python().map(ToOwned::to_owned).map_err(|err| {
        ReleaseError::precondition(
            format!("{err:#}"),
            json!({
                "reason": "python_missing",
                "hint": "install python3 or set WHEELSHIP_PYTHON",
            }),
        )
        .into()
    })
}

/// Fails with a [`ReleaseError::Tool`] carrying the tail of stderr when the
/// command exited non-zero.
pub(crate) fn ensure_success(output: &RunOutput, action: &str, command: String) -> Result<()> {
    if output.success() {
        return Ok(());
    }
    Err(ReleaseError::tool(
        format!("{action} failed (exit {})", output.code),
        json!({
            "reason": "tool_failed",
            "command": command,
            "code": output.code,
            "stderr": stderr_tail(&output.stderr),
        }),
    )
    .into())
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

fn stage_names(log: &StageLog) -> Vec<&'static str> {
    log.reached.iter().map(|stage| stage.as_str()).collect()
}

fn success_outcome(
    plan: &ReleasePlan,
    log: &StageLog,
    report: &ReleaseReport,
) -> Result<ExecutionOutcome> {
    let artifacts: Vec<ArtifactSummary> = [report.repair.output.as_path(), report.sdist.as_path()]
        .into_iter()
        .map(|path| summarize_artifact(path, &plan.root))
        .collect::<Result<_>>()?;
    for artifact in &artifacts {
        info!(
            path = %artifact.path,
            size = %format_bytes(artifact.bytes),
            sha256 = %artifact.sha256,
            "artifact ready"
        );
    }
    let upload_command = plan.upload_command(&report.repair.output, &report.sdist);
    Ok(ExecutionOutcome::success(
        format!(
            "{} {} is ready to upload ({} artifacts verified)",
            plan.package,
            plan.version,
            artifacts.len()
        ),
        json!({
            "version": plan.version,
            "project": plan.root.display().to_string(),
            "branch": report.head,
            "abi_tag": report.abi,
            "stages": stage_names(log),
            "manifest": manifest_details(plan, &report.manifest),
            "cleaned": report.cleaned,
            "image": { "name": plan.image, "status": report.image },
            "repair": report.repair,
            "artifacts": artifacts,
            "upload_command": upload_command,
        }),
    ))
}

fn stopped_outcome(plan: &ReleasePlan, log: &StageLog, stop: &ReleaseError) -> ExecutionOutcome {
    let mut details = match stop.details() {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    details.insert("version".into(), json!(plan.version));
    details.insert("stages".into(), json!(stage_names(log)));
    details.insert(
        "last_stage".into(),
        json!(log.last().map(ReleaseStage::as_str)),
    );
    ExecutionOutcome {
        status: stop.status(),
        message: stop.message().to_string(),
        details: Value::Object(details),
    }
}

fn manifest_details(plan: &ReleasePlan, report: &ManifestReport) -> Value {
    let counts: serde_json::Map<String, Value> = CYTHON_SOURCE_CLASSES
        .iter()
        .map(|class| (class.label.to_string(), json!(report.count(class.label))))
        .collect();
    json!({
        "path": relative(&report.path, &plan.root),
        "entries": report.entries.len(),
        "by_class": counts,
    })
}

fn relative(path: &Path, root: &Path) -> String {
    crate::distribution::relative_path_str(path, root)
}

fn dry_run(ctx: &CommandContext, plan: &ReleasePlan) -> Result<ExecutionOutcome> {
    let python = match resolve_python(ctx) {
        Ok(python) => python,
        Err(err) => match err.downcast::<ReleaseError>() {
            Ok(stop) => return Ok(stopped_outcome(plan, &StageLog::default(), &stop)),
            Err(other) => return Err(other),
        },
    };
    let abi = ctx.python_runtime().detect_abi_tag(&python)?;
    let (_, repaired) = plan.predicted_wheels(abi);
    let wheel = plan.dist_dir.join(repaired.to_string());
    let sdist = plan.predicted_sdist();
    let commands = plan.planned_commands(&python, abi);
    Ok(ExecutionOutcome::success(
        format!(
            "dry run: {} {} would run {} commands",
            plan.package,
            plan.version,
            commands.len()
        ),
        json!({
            "dry_run": true,
            "version": plan.version,
            "project": plan.root.display().to_string(),
            "expected_branch": plan.version.branch_name(),
            "manifest": relative(&plan.root.join(wheelship_domain::MANIFEST_FILENAME), &plan.root),
            "abi_tag": abi,
            "image": plan.image,
            "commands": commands,
            "upload_command": plan.upload_command(&wheel, &sdist),
        }),
    ))
}
