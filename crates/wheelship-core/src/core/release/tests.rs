use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use tempfile::TempDir;
use wheelship_domain::{AbiTag, ReleaseVersion, LINUX_PLATFORM, MANYLINUX_PLATFORM};

use super::*;
use crate::config::{Config, ConfigOverrides, EnvSnapshot};
use crate::container::{BackendKind, ContainerBackend, ContainerRun};
use crate::effects::{
    ContainerRuntime, Effects, FileSystem, PythonRuntime, SystemFileSystem, VersionControl,
};
use crate::CommandStatus;

const BUILT_WHEEL: &str = "pomdp_py-1.3.3-cp311-cp311-linux_x86_64.whl";
const REPAIRED_WHEEL: &str =
    "pomdp_py-1.3.3-cp311-cp311-manylinux_2_17_x86_64.manylinux2014_x86_64.whl";
const SDIST: &str = "pomdp_py-1.3.3.tar.gz";

type CallLog = Arc<Mutex<Vec<String>>>;

fn record(calls: &CallLog, call: String) {
    calls.lock().expect("call log").push(call);
}

fn ok() -> RunOutput {
    RunOutput {
        code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }
}

fn failed() -> RunOutput {
    RunOutput {
        code: 1,
        stdout: String::new(),
        stderr: "Traceback (most recent call last):\nAssertionError".to_string(),
    }
}

struct FakeGit {
    head: Option<HeadState>,
    calls: CallLog,
}

impl VersionControl for FakeGit {
    fn head(&self, repo: &Path) -> Result<HeadState> {
        record(&self.calls, format!("git head {}", repo.display()));
        match &self.head {
            Some(head) => Ok(head.clone()),
            None => bail!("fatal: not a git repository"),
        }
    }
}

struct FakeContainers {
    backend: ContainerBackend,
    image_present: bool,
    fail_repair: bool,
    calls: CallLog,
}

impl ContainerRuntime for FakeContainers {
    fn backend(&self) -> &ContainerBackend {
        &self.backend
    }

    fn image_exists(&self, image: &str) -> Result<bool> {
        record(&self.calls, format!("images {image}"));
        Ok(self.image_present)
    }

    fn pull(&self, image: &str) -> Result<RunOutput> {
        record(&self.calls, format!("pull {image}"));
        Ok(ok())
    }

    fn run(&self, spec: &ContainerRun) -> Result<RunOutput> {
        record(
            &self.calls,
            format!("container {} {}", spec.program, spec.args.join(" ")),
        );
        if spec.program == "auditwheel" {
            if self.fail_repair {
                return Ok(failed());
            }
            let input = spec.args[1].rsplit('/').next().unwrap_or_default();
            let repaired = input.replace(LINUX_PLATFORM, MANYLINUX_PLATFORM);
            let wheelhouse = spec.mounts[0].host.join("wheelhouse");
            fs::create_dir_all(&wheelhouse)?;
            fs::write(wheelhouse.join(repaired), b"repaired")?;
        }
        Ok(ok())
    }
}

struct FakePython {
    fail_on: Option<&'static str>,
    calls: CallLog,
}

impl PythonRuntime for FakePython {
    fn detect_abi_tag(&self, _python: &str) -> Result<AbiTag> {
        Ok(AbiTag::cpython(3, 11))
    }

    fn run(&self, python: &str, args: &[String], cwd: &Path) -> Result<RunOutput> {
        let call = format!("{python} {}", args.join(" "));
        record(&self.calls, call.clone());
        if self.fail_on.is_some_and(|pattern| call.contains(pattern)) {
            return Ok(failed());
        }
        if args == ["-m", "build"] {
            let dist = cwd.join("dist");
            fs::create_dir_all(&dist)?;
            fs::write(dist.join(BUILT_WHEEL), b"wheel")?;
            fs::write(dist.join(SDIST), b"sdist")?;
        }
        Ok(ok())
    }
}

/// The real filesystem, reporting a fixed invoking user.
struct FakeFs {
    user: Option<(u32, u32)>,
}

impl FileSystem for FakeFs {
    fn remove_file(&self, path: &Path) -> Result<()> {
        SystemFileSystem.remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        SystemFileSystem.remove_dir_all(path)
    }

    fn rename(&self, src: &Path, dest: &Path) -> Result<()> {
        SystemFileSystem.rename(src, dest)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        SystemFileSystem.list_dir(path)
    }

    fn current_user(&self) -> Option<(u32, u32)> {
        self.user
    }
}

struct FakeEffects {
    git: FakeGit,
    containers: FakeContainers,
    python: FakePython,
    fs: FakeFs,
}

impl Effects for FakeEffects {
    fn git(&self) -> &dyn VersionControl {
        &self.git
    }

    fn containers(&self) -> &dyn ContainerRuntime {
        &self.containers
    }

    fn python(&self) -> &dyn PythonRuntime {
        &self.python
    }

    fn fs(&self) -> &dyn FileSystem {
        &self.fs
    }
}

struct Harness {
    temp: TempDir,
    calls: CallLog,
    head: Option<HeadState>,
    image_present: bool,
    fail_repair: bool,
    fail_on: Option<&'static str>,
    backend: BackendKind,
    user: Option<(u32, u32)>,
}

impl Harness {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let package = temp.path().join("pomdp_py");
        fs::create_dir_all(package.join("algorithms")).expect("mkdir");
        fs::write(package.join("framework.pxd"), b"").expect("pxd");
        fs::write(package.join("framework.pyx"), b"").expect("pyx");
        fs::write(package.join("algorithms").join("pomcp.pyx"), b"").expect("pyx");
        Self {
            temp,
            calls: Arc::default(),
            head: Some(HeadState::Branch("dev-1.3.3".to_string())),
            image_present: true,
            fail_repair: false,
            fail_on: None,
            backend: BackendKind::Docker,
            user: Some((1000, 1000)),
        }
    }

    fn root(&self) -> PathBuf {
        self.temp.path().to_path_buf()
    }

    fn config(&self, project: PathBuf) -> Config {
        let snapshot = EnvSnapshot::testing(&[("WHEELSHIP_PYTHON", "python3")]);
        let overrides = ConfigOverrides {
            project: Some(project),
            ..ConfigOverrides::default()
        };
        Config::from_snapshot(&snapshot, &overrides, None).expect("config")
    }

    fn run(&self, dry_run: bool) -> ExecutionOutcome {
        self.run_in(self.root(), dry_run)
    }

    fn run_in(&self, project: PathBuf, dry_run: bool) -> ExecutionOutcome {
        let effects = Arc::new(FakeEffects {
            git: FakeGit {
                head: self.head.clone(),
                calls: Arc::clone(&self.calls),
            },
            containers: FakeContainers {
                backend: ContainerBackend {
                    program: "docker".to_string(),
                    kind: self.backend,
                },
                image_present: self.image_present,
                fail_repair: self.fail_repair,
                calls: Arc::clone(&self.calls),
            },
            python: FakePython {
                fail_on: self.fail_on,
                calls: Arc::clone(&self.calls),
            },
            fs: FakeFs { user: self.user },
        });
        let ctx = CommandContext::with_effects(self.config(project), effects);
        let request = ReleaseRequest {
            version: ReleaseVersion::new("1.3.3"),
            dry_run,
        };
        release(&ctx, &request).expect("release runs")
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log").clone()
    }

    fn position(&self, needle: &str) -> Option<usize> {
        self.calls().iter().position(|call| call.contains(needle))
    }
}

fn stages(outcome: &ExecutionOutcome) -> Vec<String> {
    outcome.details["stages"]
        .as_array()
        .expect("stages")
        .iter()
        .filter_map(|stage| stage.as_str().map(ToOwned::to_owned))
        .collect()
}

#[test]
fn full_release_leaves_repaired_wheel_and_sdist() {
    let harness = Harness::new();
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Ok, "{outcome:?}");

    let dist = harness.root().join("dist");
    assert!(dist.join(REPAIRED_WHEEL).is_file());
    assert!(dist.join(SDIST).is_file());
    assert!(!dist.join(BUILT_WHEEL).exists());
    assert!(!harness.root().join("wheelhouse").exists());

    let manifest = fs::read_to_string(harness.root().join("MANIFEST.in")).expect("manifest");
    assert_eq!(
        manifest,
        "include pomdp_py/framework.pxd\n\
         include pomdp_py/algorithms/pomcp.pyx\n\
         include pomdp_py/framework.pyx\n"
    );

    assert_eq!(
        outcome.details["upload_command"],
        format!("twine upload dist/{REPAIRED_WHEEL} dist/{SDIST}")
    );
    assert_eq!(stages(&outcome).last().map(String::as_str), Some("done"));
    assert_eq!(outcome.details["image"]["status"], "present");
    assert_eq!(outcome.details["artifacts"].as_array().map(Vec::len), Some(2));
}

#[test]
fn stages_run_in_pipeline_order() {
    let harness = Harness::new();
    harness.run(false);
    let dist = harness.root().join("dist");
    let wheel_install = format!("-m pip install {}", dist.join(REPAIRED_WHEEL).display());
    let sdist_install = format!("-m pip install {}", dist.join(SDIST).display());
    let order: [&str; 8] = [
        "git head",
        "setup.py build_ext --inplace",
        "-m build",
        "images quay.io/pypa/manylinux2014_x86_64",
        "container auditwheel repair /io/dist/",
        "container chown -R",
        wheel_install.as_str(),
        sdist_install.as_str(),
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|needle| harness.position(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", harness.calls());
}

#[test]
fn wrong_branch_stops_before_building() {
    let mut harness = Harness::new();
    harness.head = Some(HeadState::Branch("main".to_string()));
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::UserError);
    assert_eq!(outcome.details["reason"], "wrong_branch");
    assert_eq!(outcome.details["expected_branch"], "dev-1.3.3");
    assert_eq!(stages(&outcome), vec!["manifest_written"]);
    assert!(harness.root().join("MANIFEST.in").is_file());
    assert_eq!(harness.calls().len(), 1, "{:?}", harness.calls());
}

#[test]
fn detached_head_counts_as_wrong_branch() {
    let mut harness = Harness::new();
    harness.head = Some(HeadState::Detached("3f2a9c1".to_string()));
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::UserError);
    assert!(outcome.message.contains("detached"));
}

#[test]
fn unreadable_head_is_a_user_error() {
    let mut harness = Harness::new();
    harness.head = None;
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::UserError);
    assert_eq!(outcome.details["reason"], "head_unreadable");
}

#[test]
fn missing_project_dir_is_a_user_error() {
    let harness = Harness::new();
    let outcome = harness.run_in(harness.root().join("absent"), false);
    assert_eq!(outcome.status, CommandStatus::UserError);
    assert_eq!(outcome.details["reason"], "project_missing");
    assert!(harness.calls().is_empty());
}

#[test]
fn absent_image_is_pulled_before_repair() {
    let mut harness = Harness::new();
    harness.image_present = false;
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Ok, "{outcome:?}");
    assert_eq!(outcome.details["image"]["status"], "pulled");
    let pull = harness.position("pull quay.io").expect("pulled");
    let repair = harness.position("container auditwheel").expect("repaired");
    assert!(pull < repair);
}

#[test]
fn present_image_is_not_pulled() {
    let harness = Harness::new();
    harness.run(false);
    assert!(harness.position("pull quay.io").is_none());
}

#[test]
fn failed_uninstall_is_tolerated() {
    let mut harness = Harness::new();
    harness.fail_on = Some("pip uninstall");
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Ok, "{outcome:?}");
}

#[test]
fn failing_test_suite_stops_before_sdist_verification() {
    let mut harness = Harness::new();
    harness.fail_on = Some("tests/test_all.py");
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Failure);
    assert_eq!(outcome.details["reason"], "tool_failed");
    assert_eq!(outcome.details["last_stage"], "repaired");
    assert!(outcome.details["stderr"]
        .as_str()
        .is_some_and(|tail| tail.ends_with("AssertionError")));
    let sdist_install = format!(
        "-m pip install {}",
        harness.root().join("dist").join(SDIST).display()
    );
    assert!(harness.position(&sdist_install).is_none());
}

#[test]
fn failed_extension_build_stops_before_packaging() {
    let mut harness = Harness::new();
    harness.fail_on = Some("build_ext");
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Failure);
    assert_eq!(stages(&outcome), vec!["manifest_written", "branch_verified"]);
    assert!(harness.position("-m build").is_none());
}

#[test]
fn failed_repair_keeps_the_built_wheel() {
    let mut harness = Harness::new();
    harness.fail_repair = true;
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Failure);
    assert_eq!(outcome.details["last_stage"], "image_ready");
    assert!(harness.root().join("dist").join(BUILT_WHEEL).is_file());
    assert!(harness.position("container chown").is_none());
}

#[test]
fn stale_artifacts_are_cleared_before_building() {
    let harness = Harness::new();
    let dist = harness.root().join("dist");
    fs::create_dir_all(&dist).expect("dist");
    fs::write(dist.join(REPAIRED_WHEEL), b"old").expect("stale wheel");
    fs::write(dist.join("pomdp_py-1.3.2.tar.gz"), b"older release").expect("older sdist");
    fs::create_dir_all(harness.root().join("wheelhouse")).expect("wheelhouse");

    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Ok, "{outcome:?}");
    let cleaned = outcome.details["cleaned"].as_array().expect("cleaned");
    assert_eq!(cleaned.len(), 2);
    assert!(dist.join("pomdp_py-1.3.2.tar.gz").is_file());
    assert_eq!(fs::read(dist.join(REPAIRED_WHEEL)).expect("wheel"), b"repaired");
}

#[test]
fn dry_run_touches_nothing() {
    let harness = Harness::new();
    let outcome = harness.run(true);
    assert_eq!(outcome.status, CommandStatus::Ok);
    assert_eq!(outcome.details["dry_run"], true);
    assert!(harness.calls().is_empty());
    assert!(!harness.root().join("MANIFEST.in").exists());
    let commands = outcome.details["commands"].as_array().expect("commands");
    assert_eq!(commands[0]["stage"], "built");
    assert_eq!(
        outcome.details["upload_command"],
        format!("twine upload dist/{REPAIRED_WHEEL} dist/{SDIST}")
    );
}

#[test]
fn ownership_goes_back_to_the_invoking_user() {
    let mut harness = Harness::new();
    harness.user = Some((1234, 5678));
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Ok, "{outcome:?}");
    assert!(harness
        .position("container chown -R 1234:5678 /io/wheelhouse")
        .is_some());
    assert_eq!(outcome.details["repair"]["ownership_fixed"], true);
}

#[test]
fn podman_backend_skips_the_chown() {
    let mut harness = Harness::new();
    harness.backend = BackendKind::Podman;
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Ok, "{outcome:?}");
    assert!(harness.position("container chown").is_none());
    assert_eq!(outcome.details["repair"]["ownership_fixed"], false);
    assert!(harness
        .root()
        .join("dist")
        .join(REPAIRED_WHEEL)
        .is_file());
}

#[test]
fn running_as_root_skips_the_chown() {
    let mut harness = Harness::new();
    harness.user = Some((0, 0));
    let outcome = harness.run(false);
    assert_eq!(outcome.status, CommandStatus::Ok, "{outcome:?}");
    assert!(harness.position("container chown").is_none());
}
