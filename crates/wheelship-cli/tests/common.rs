#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::assert::Assert;
use serde_json::Value;
use tempfile::TempDir;

const ENV_KEYS: [&str; 7] = [
    "WHEELSHIP_PROJECT_ROOT",
    "WHEELSHIP_PACKAGE",
    "WHEELSHIP_PYTHON",
    "WHEELSHIP_CONTAINER_BACKEND",
    "WHEELSHIP_MANYLINUX_IMAGE",
    "WHEELSHIP_TEST_ENTRY",
    "WHEELSHIP_MAX_CAPTURE_BYTES",
];

/// A `wheelship` invocation with no inherited `WHEELSHIP_*` settings.
pub fn wheelship() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("wheelship");
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

/// A checkout of a small Cython package, not yet under version control.
pub fn prepare_project(prefix: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let root = temp.path().join("pomdp-py");
    let package = root.join("pomdp_py");
    fs::create_dir_all(package.join("algorithms")).expect("package dir");
    fs::write(package.join("framework.pxd"), "cdef class Agent:\n    pass\n").expect("pxd");
    fs::write(package.join("framework.pyx"), "cdef class Agent:\n    pass\n").expect("pyx");
    fs::write(package.join("algorithms").join("po_uct.pyx"), "").expect("pyx");
    fs::create_dir_all(root.join("tests")).expect("tests dir");
    fs::write(root.join("tests").join("test_all.py"), "print('ok')\n").expect("tests");
    (temp, root)
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(repo)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}

/// Initializes `repo` with HEAD on `branch`.
pub fn init_repo(repo: &Path, branch: &str) {
    git(repo, &["init", "-q"]);
    git(repo, &["checkout", "-q", "-b", branch]);
}

pub fn find_python() -> Option<String> {
    ["python3", "python"].into_iter().find_map(|candidate| {
        let output = Command::new(candidate)
            .args(["-c", "import sys; print(sys.implementation.name)"])
            .output()
            .ok()?;
        let name = String::from_utf8_lossy(&output.stdout);
        (output.status.success() && name.trim() == "cpython").then(|| candidate.to_string())
    })
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("json output")
}

pub fn stdout_text(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

pub fn stderr_text(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).to_string()
}
