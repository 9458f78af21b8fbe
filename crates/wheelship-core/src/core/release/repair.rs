use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};
use wheelship_domain::{is_manylinux_platform, AbiTag};

use super::{ensure_success, plan::ReleasePlan};
use crate::config::context::CommandContext;
use crate::container::{build_run_args, BackendKind, ContainerRun, Mount};
use crate::distribution::{find_single_wheel, WheelQuery};
use crate::process::render_command;

#[derive(Clone, Debug, Serialize)]
pub(crate) struct RepairReport {
    /// Wheel produced by `python -m build`, deleted once repaired.
    pub input: String,
    /// Manylinux wheel, moved into `dist/`.
    pub output: PathBuf,
    pub ownership_fixed: bool,
}

fn is_host_platform(platform: &str) -> bool {
    !is_manylinux_platform(platform)
}

fn project_mount(plan: &ReleasePlan) -> Mount {
    Mount {
        host: plan.root.clone(),
        guest: plan.mount_point.clone(),
    }
}

pub(crate) fn repair_run(plan: &ReleasePlan, wheel_name: &str) -> ContainerRun {
    let wheel = plan.guest_path(&plan.dist_dir.join(wheel_name));
    let wheelhouse = format!("{}/", plan.guest_path(&plan.wheelhouse_dir));
    ContainerRun {
        image: plan.image.clone(),
        mounts: vec![project_mount(plan)],
        program: "auditwheel".to_string(),
        args: vec!["repair".to_string(), wheel, "-w".to_string(), wheelhouse],
    }
}

/// Hands the container-written wheelhouse back to the invoking user.
pub(crate) fn chown_run(plan: &ReleasePlan, uid: u32, gid: u32) -> ContainerRun {
    ContainerRun {
        image: plan.image.clone(),
        mounts: vec![project_mount(plan)],
        program: "chown".to_string(),
        args: vec![
            "-R".to_string(),
            format!("{uid}:{gid}"),
            plan.guest_path(&plan.wheelhouse_dir),
        ],
    }
}

/// Turns the freshly built `linux_x86_64` wheel into a manylinux wheel in
/// `dist/`. The image must already be present.
pub(super) fn repair_wheel(
    ctx: &CommandContext,
    plan: &ReleasePlan,
    abi: AbiTag,
) -> Result<RepairReport> {
    let fs = ctx.fs();
    let (predicted_input, predicted_output) = plan.predicted_wheels(abi);

    let (input_path, input) = find_single_wheel(
        fs,
        &plan.dist_dir,
        &WheelQuery {
            package: &plan.package,
            version: &plan.version,
            abi,
            platform: is_host_platform,
            predicted: &predicted_input,
        },
    )?;
    debug!(wheel = %input, "repairing wheel");

    let run = repair_run(plan, &input.to_string());
    let output = ctx.containers().run(&run)?;
    ensure_success(
        &output,
        "auditwheel repair",
        render_command(&ctx.containers().backend().program, &build_run_args(&run)),
    )?;
    fs.remove_file(&input_path)?;

    let ownership_fixed = restore_ownership(ctx, plan)?;

    let (repaired_path, repaired) = find_single_wheel(
        fs,
        &plan.wheelhouse_dir,
        &WheelQuery {
            package: &plan.package,
            version: &plan.version,
            abi,
            platform: is_manylinux_platform,
            predicted: &predicted_output,
        },
    )?;
    let destination = plan.dist_dir.join(repaired.to_string());
    fs.rename(&repaired_path, &destination)?;
    fs.remove_dir_all(&plan.wheelhouse_dir)?;
    info!(wheel = %repaired, "repaired wheel moved into dist");

    Ok(RepairReport {
        input: input.to_string(),
        output: destination,
        ownership_fixed,
    })
}

/// Rootful docker leaves the wheelhouse owned by root. Rootless podman
/// already maps container root to the invoking user, and a chown there
/// would hand the files to a subordinate uid instead.
fn restore_ownership(ctx: &CommandContext, plan: &ReleasePlan) -> Result<bool> {
    let backend = ctx.containers().backend();
    if backend.kind == BackendKind::Podman {
        debug!("podman backend; wheelhouse ownership left as written");
        return Ok(false);
    }
    let Some((uid, gid)) = ctx.fs().current_user() else {
        return Ok(false);
    };
    if uid == 0 {
        return Ok(false);
    }
    let run = chown_run(plan, uid, gid);
    let output = ctx.containers().run(&run)?;
    ensure_success(
        &output,
        "restoring wheelhouse ownership",
        render_command(&backend.program, &build_run_args(&run)),
    )?;
    Ok(true)
}
