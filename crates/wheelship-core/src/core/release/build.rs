use std::path::Path;

use anyhow::Result;

use super::ensure_success;
use crate::effects::PythonRuntime;
use crate::process::{render_command, RunOutput};

/// One interpreter invocation of the build stages.
#[derive(Clone, Copy, Debug)]
pub(crate) enum BuildStep {
    /// `python -m pip install <packages>`
    Install(&'static [&'static str]),
    /// `python <args>`
    Run(&'static [&'static str]),
}

pub(crate) const EXTENSION_STEPS: [BuildStep; 2] = [
    BuildStep::Install(&["setuptools", "cython"]),
    BuildStep::Run(&["setup.py", "build_ext", "--inplace"]),
];

pub(crate) const DISTRIBUTION_STEPS: [BuildStep; 2] = [
    BuildStep::Install(&["build"]),
    BuildStep::Run(&["-m", "build"]),
];

impl BuildStep {
    pub(crate) fn argv(self) -> Vec<String> {
        match self {
            BuildStep::Install(packages) => ["-m", "pip", "install"]
                .iter()
                .chain(packages)
                .map(ToString::to_string)
                .collect(),
            BuildStep::Run(args) => args.iter().map(ToString::to_string).collect(),
        }
    }

    fn execute(self, runtime: &dyn PythonRuntime, python: &str, cwd: &Path) -> Result<RunOutput> {
        match self {
            BuildStep::Install(packages) => {
                let packages: Vec<String> = packages.iter().map(ToString::to_string).collect();
                runtime.pip_install(python, &packages, cwd)
            }
            BuildStep::Run(_) => runtime.run(python, &self.argv(), cwd),
        }
    }

    fn action(self) -> &'static str {
        match self {
            BuildStep::Install(_) => "installing build requirements",
            BuildStep::Run(["setup.py", ..]) => "compiling the Cython extensions",
            BuildStep::Run(_) => "building the wheel and sdist",
        }
    }
}

/// Runs `steps` in order from the project root, stopping at the first
/// non-zero exit.
pub(super) fn run_steps(
    runtime: &dyn PythonRuntime,
    python: &str,
    root: &Path,
    steps: &[BuildStep],
) -> Result<()> {
    for step in steps {
        let output = step.execute(runtime, python, root)?;
        ensure_success(&output, step.action(), render_command(python, &step.argv()))?;
    }
    Ok(())
}
