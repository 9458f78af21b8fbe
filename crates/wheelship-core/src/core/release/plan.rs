use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use wheelship_domain::{
    sdist_filename, AbiTag, ReleaseVersion, WheelFilename, LINUX_PLATFORM, MANYLINUX_PLATFORM,
};

use super::{build, repair, verify, ReleaseStage};
use crate::config::Config;
use crate::container::build_run_args;
use crate::process::render_command;

#[derive(Clone, Debug)]
pub struct ReleaseRequest {
    pub version: ReleaseVersion,
    pub dry_run: bool,
}

/// Every path and name a release run touches, resolved up front so no stage
/// depends on the process working directory.
#[derive(Clone, Debug)]
pub(crate) struct ReleasePlan {
    pub version: ReleaseVersion,
    pub package: String,
    pub root: PathBuf,
    pub scan_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub wheelhouse_dir: PathBuf,
    pub test_entry: PathBuf,
    pub image: String,
    pub backend: String,
    pub mount_point: PathBuf,
    pub repository: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct PlannedCommand {
    pub stage: ReleaseStage,
    pub command: String,
}

impl ReleasePlan {
    pub(crate) fn new(config: &Config, version: &ReleaseVersion) -> Self {
        let project = config.project();
        let root = project.root.clone();
        Self {
            version: version.clone(),
            package: project.package.clone(),
            scan_dir: project.scan_dir.clone(),
            dist_dir: root.join("dist"),
            wheelhouse_dir: root.join("wheelhouse"),
            test_entry: root.join(&project.test_entry),
            image: config.container().image.clone(),
            backend: config.container_backend().program,
            mount_point: config.container().mount_point.clone(),
            repository: config.publish().repository.clone(),
            root,
        }
    }

    /// Where a path under the project root appears inside the repair container.
    pub(crate) fn guest_path(&self, host: &Path) -> String {
        let relative = host.strip_prefix(&self.root).unwrap_or(host);
        let mut guest = self.mount_point.display().to_string();
        for component in relative.components() {
            if let Component::Normal(part) = component {
                guest.push('/');
                guest.push_str(&part.to_string_lossy());
            }
        }
        guest
    }

    pub(crate) fn upload_command(&self, wheel: &Path, sdist: &Path) -> String {
        let mut args = vec!["upload".to_string()];
        if let Some(repository) = &self.repository {
            args.push("--repository".to_string());
            args.push(repository.clone());
        }
        for artifact in [wheel, sdist] {
            args.push(
                artifact
                    .strip_prefix(&self.root)
                    .unwrap_or(artifact)
                    .display()
                    .to_string(),
            );
        }
        render_command("twine", &args)
    }

    pub(crate) fn predicted_wheels(&self, abi: AbiTag) -> (WheelFilename, WheelFilename) {
        (
            WheelFilename::predicted(&self.package, &self.version, abi, LINUX_PLATFORM),
            WheelFilename::predicted(&self.package, &self.version, abi, MANYLINUX_PLATFORM),
        )
    }

    pub(crate) fn predicted_sdist(&self) -> PathBuf {
        self.dist_dir.join(sdist_filename(&self.package, &self.version))
    }

    /// The external commands a run would execute, using predicted filenames.
    pub(crate) fn planned_commands(&self, python: &str, abi: AbiTag) -> Vec<PlannedCommand> {
        let (built, repaired) = self.predicted_wheels(abi);
        let mut commands = Vec::new();
        let mut push = |stage, command| commands.push(PlannedCommand { stage, command });

        for step in build::EXTENSION_STEPS {
            push(ReleaseStage::Built, render_command(python, &step.argv()));
        }
        for step in build::DISTRIBUTION_STEPS {
            push(ReleaseStage::Packaged, render_command(python, &step.argv()));
        }
        push(
            ReleaseStage::ImageReady,
            render_command(&self.backend, &["pull".to_string(), self.image.clone()]),
        );
        let repair_run = repair::repair_run(self, &built.to_string());
        push(
            ReleaseStage::Repaired,
            render_command(&self.backend, &build_run_args(&repair_run)),
        );

        let wheel = self.dist_dir.join(repaired.to_string());
        let sdist = self.predicted_sdist();
        for (stage, artifact) in [
            (ReleaseStage::WheelVerified, &wheel),
            (ReleaseStage::SourceVerified, &sdist),
        ] {
            for argv in verify::verification_argv(self, artifact) {
                push(stage, render_command(python, &argv));
            }
        }
        commands
    }
}
