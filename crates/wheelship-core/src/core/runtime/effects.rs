use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use wheelship_domain::AbiTag;

use super::process::{run_command, run_command_streaming, RunOutput};
use crate::container::{build_run_args, ContainerBackend, ContainerRun};
use crate::python_sys::detect_abi_tag;

/// What `HEAD` points at in a checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum HeadState {
    Branch(String),
    Detached(String),
}

pub trait VersionControl: Send + Sync {
    fn head(&self, repo: &Path) -> Result<HeadState>;
}

pub trait ContainerRuntime: Send + Sync {
    fn backend(&self) -> &ContainerBackend;
    /// True when the local image store has an entry for `image`. Never pulls.
    fn image_exists(&self, image: &str) -> Result<bool>;
    fn pull(&self, image: &str) -> Result<RunOutput>;
    fn run(&self, spec: &ContainerRun) -> Result<RunOutput>;
}

pub trait PythonRuntime: Send + Sync {
    fn detect_abi_tag(&self, python: &str) -> Result<AbiTag>;
    fn run(&self, python: &str, args: &[String], cwd: &Path) -> Result<RunOutput>;

    fn pip_install(&self, python: &str, args: &[String], cwd: &Path) -> Result<RunOutput> {
        let mut argv = vec!["-m".to_string(), "pip".to_string(), "install".to_string()];
        argv.extend(args.iter().cloned());
        self.run(python, &argv, cwd)
    }

    fn pip_uninstall(&self, python: &str, package: &str, cwd: &Path) -> Result<RunOutput> {
        let argv = ["-m", "pip", "uninstall", "-y", package]
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        self.run(python, &argv, cwd)
    }
}

pub trait FileSystem: Send + Sync {
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn rename(&self, src: &Path, dest: &Path) -> Result<()>;
    /// File names directly inside `path`, sorted.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;
    /// `(uid, gid)` of the invoking user, where the platform has them.
    fn current_user(&self) -> Option<(u32, u32)>;
}

pub trait Effects: Send + Sync {
    fn git(&self) -> &dyn VersionControl;
    fn containers(&self) -> &dyn ContainerRuntime;
    fn python(&self) -> &dyn PythonRuntime;
    fn fs(&self) -> &dyn FileSystem;
}

pub struct SystemEffects {
    git: Arc<SystemGit>,
    containers: Arc<SystemContainerRuntime>,
    python: Arc<SystemPythonRuntime>,
    fs: Arc<SystemFileSystem>,
}

impl SystemEffects {
    #[must_use]
    pub fn new(backend: ContainerBackend, capture_limit: usize) -> Self {
        Self {
            git: Arc::new(SystemGit { capture_limit }),
            containers: Arc::new(SystemContainerRuntime {
                backend,
                capture_limit,
            }),
            python: Arc::new(SystemPythonRuntime { capture_limit }),
            fs: Arc::new(SystemFileSystem),
        }
    }
}

impl Effects for SystemEffects {
    fn git(&self) -> &dyn VersionControl {
        self.git.as_ref()
    }

    fn containers(&self) -> &dyn ContainerRuntime {
        self.containers.as_ref()
    }

    fn python(&self) -> &dyn PythonRuntime {
        self.python.as_ref()
    }

    fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }
}

struct SystemGit {
    capture_limit: usize,
}

impl VersionControl for SystemGit {
    fn head(&self, repo: &Path) -> Result<HeadState> {
        let symbolic = run_command(
            "git",
            &strings(&["symbolic-ref", "--short", "-q", "HEAD"]),
            repo,
            self.capture_limit,
        )?;
        if symbolic.success() {
            return Ok(HeadState::Branch(symbolic.stdout.trim().to_string()));
        }
        let commit = run_command(
            "git",
            &strings(&["rev-parse", "--short", "HEAD"]),
            repo,
            self.capture_limit,
        )?;
        if commit.success() {
            return Ok(HeadState::Detached(commit.stdout.trim().to_string()));
        }
        bail!(
            "git could not resolve HEAD in {}: {}",
            repo.display(),
            commit.stderr.trim()
        )
    }
}

struct SystemContainerRuntime {
    backend: ContainerBackend,
    capture_limit: usize,
}

impl ContainerRuntime for SystemContainerRuntime {
    fn backend(&self) -> &ContainerBackend {
        &self.backend
    }

    fn image_exists(&self, image: &str) -> Result<bool> {
        let output = run_command(
            &self.backend.program,
            &strings(&["images", "-q", image]),
            Path::new("."),
            self.capture_limit,
        )?;
        if !output.success() {
            bail!(
                "{} images failed (exit {}): {}",
                self.backend.name(),
                output.code,
                output.stderr.trim()
            );
        }
        Ok(!output.stdout.trim().is_empty())
    }

    fn pull(&self, image: &str) -> Result<RunOutput> {
        run_command_streaming(
            &self.backend.program,
            &strings(&["pull", image]),
            Path::new("."),
            self.capture_limit,
        )
    }

    fn run(&self, spec: &ContainerRun) -> Result<RunOutput> {
        let args = build_run_args(spec);
        let cwd = spec
            .mounts
            .first()
            .map_or_else(|| PathBuf::from("."), |mount| mount.host.clone());
        run_command_streaming(&self.backend.program, &args, &cwd, self.capture_limit)
    }
}

struct SystemPythonRuntime {
    capture_limit: usize,
}

impl PythonRuntime for SystemPythonRuntime {
    fn detect_abi_tag(&self, python: &str) -> Result<AbiTag> {
        detect_abi_tag(python, self.capture_limit)
    }

    fn run(&self, python: &str, args: &[String], cwd: &Path) -> Result<RunOutput> {
        run_command_streaming(python, args, cwd, self.capture_limit)
    }
}

pub(crate) struct SystemFileSystem;

impl FileSystem for SystemFileSystem {
    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("removing file {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path).with_context(|| format!("removing dir {}", path.display()))
    }

    fn rename(&self, src: &Path, dest: &Path) -> Result<()> {
        std::fs::rename(src, dest)
            .with_context(|| format!("moving {} to {}", src.display(), dest.display()))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in
            std::fs::read_dir(path).with_context(|| format!("reading dir {}", path.display()))?
        {
            let entry = entry.with_context(|| format!("reading dir {}", path.display()))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    #[cfg(unix)]
    fn current_user(&self) -> Option<(u32, u32)> {
        Some((
            nix::unistd::getuid().as_raw(),
            nix::unistd::getgid().as_raw(),
        ))
    }

    #[cfg(not(unix))]
    fn current_user(&self) -> Option<(u32, u32)> {
        None
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

pub type SharedEffects = Arc<dyn Effects>;
