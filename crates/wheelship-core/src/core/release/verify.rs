use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use super::{ensure_success, plan::ReleasePlan};
use crate::config::context::CommandContext;
use crate::process::render_command;

/// `uninstall`, `install`, and test-suite argv for one artifact.
pub(crate) fn verification_argv(plan: &ReleasePlan, artifact: &Path) -> [Vec<String>; 3] {
    [
        ["-m", "pip", "uninstall", "-y", plan.package.as_str()]
            .iter()
            .map(ToString::to_string)
            .collect(),
        vec![
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            artifact.display().to_string(),
        ],
        vec![plan.test_entry.display().to_string()],
    ]
}

/// Installs `artifact` in place of whatever copy of the package is present
/// and runs the test suite against it.
pub(super) fn verify_artifact(
    ctx: &CommandContext,
    plan: &ReleasePlan,
    python: &str,
    artifact: &Path,
    label: &str,
) -> Result<()> {
    let runtime = ctx.python_runtime();

    let removed = runtime.pip_uninstall(python, &plan.package, &plan.root)?;
    if !removed.success() {
        warn!(
            package = %plan.package,
            code = removed.code,
            "uninstall failed; continuing with install"
        );
    }

    let install_args = vec![artifact.display().to_string()];
    let installed = runtime.pip_install(python, &install_args, &plan.root)?;
    let [_, install_argv, test_argv] = verification_argv(plan, artifact);
    ensure_success(
        &installed,
        &format!("installing the {label}"),
        render_command(python, &install_argv),
    )?;

    let tests = runtime.run(python, &test_argv, &plan.root)?;
    ensure_success(
        &tests,
        &format!("test suite against the {label}"),
        render_command(python, &test_argv),
    )?;
    info!(artifact = %artifact.display(), "{label} verified");
    Ok(())
}
