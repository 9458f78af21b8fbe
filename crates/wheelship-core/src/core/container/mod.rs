//! Container backend selection and `run` argument assembly.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Docker,
    Podman,
    Custom,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContainerBackend {
    pub program: String,
    pub kind: BackendKind,
}

impl ContainerBackend {
    /// Maps a configured backend name onto a program. Unknown names are used
    /// verbatim as the program, which lets a wrapper script stand in for docker.
    #[must_use]
    pub fn from_name(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("docker") {
            return Self {
                program: resolve_program("docker"),
                kind: BackendKind::Docker,
            };
        }
        if trimmed.eq_ignore_ascii_case("podman") {
            return Self {
                program: resolve_program("podman"),
                kind: BackendKind::Podman,
            };
        }
        Self {
            program: trimmed.to_string(),
            kind: BackendKind::Custom,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.kind {
            BackendKind::Docker => "docker",
            BackendKind::Podman => "podman",
            BackendKind::Custom => "custom",
        }
    }
}

fn resolve_program(name: &str) -> String {
    which::which(name).map_or_else(
        |_| name.to_string(),
        |path| path.to_string_lossy().to_string(),
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub guest: PathBuf,
}

/// A one-shot `--rm` container invocation.
#[derive(Clone, Debug)]
pub struct ContainerRun {
    pub image: String,
    pub mounts: Vec<Mount>,
    pub program: String,
    pub args: Vec<String>,
}

pub(crate) fn build_run_args(run: &ContainerRun) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];
    for mount in unique_mounts(&run.mounts) {
        args.push("--volume".to_string());
        args.push(format!(
            "{}:{}:rw",
            mount.host.display(),
            mount.guest.display()
        ));
    }
    args.push(run.image.clone());
    args.push(run.program.clone());
    args.extend(run.args.iter().cloned());
    args
}

fn unique_mounts(mounts: &[Mount]) -> Vec<Mount> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for mount in mounts {
        let host = canonical_or(&mount.host);
        if seen.insert((host.clone(), mount.guest.clone())) {
            unique.push(Mount {
                host,
                guest: mount.guest.clone(),
            });
        }
    }
    unique
}

fn canonical_or(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
