//! Configuration, settings, and per-command context assembly.

pub mod context;

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::container::ContainerBackend;
use crate::process::DEFAULT_MAX_CAPTURE_BYTES;

pub const DEFAULT_PACKAGE: &str = "pomdp_py";
pub const DEFAULT_MANYLINUX_IMAGE: &str = "quay.io/pypa/manylinux2014_x86_64";
pub const DEFAULT_TEST_ENTRY: &str = "tests/test_all.py";
pub const CONTAINER_MOUNT_POINT: &str = "/io";

/// Values supplied on the command line; they take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project: Option<PathBuf>,
    pub package: Option<String>,
    pub repository: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    /// Returns the variable when it is set to something other than whitespace.
    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) project: ProjectConfig,
    pub(crate) python: PythonConfig,
    pub(crate) container: ContainerConfig,
    pub(crate) publish: PublishConfig,
    pub(crate) process: ProcessConfig,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error if no project root is configured and the home
    /// directory cannot be determined.
    pub fn from_env(overrides: &ConfigOverrides) -> Result<Self> {
        let snapshot = EnvSnapshot::capture();
        Self::from_snapshot(&snapshot, overrides, dirs_next::home_dir())
    }

    pub(crate) fn from_snapshot(
        snapshot: &EnvSnapshot,
        overrides: &ConfigOverrides,
        home: Option<PathBuf>,
    ) -> Result<Self> {
        let root = match (&overrides.project, snapshot.var("WHEELSHIP_PROJECT_ROOT")) {
            (Some(path), _) => path.clone(),
            (None, Some(value)) => PathBuf::from(value),
            (None, None) => home
                .ok_or_else(|| {
                    anyhow!("cannot determine home directory; pass --project or set WHEELSHIP_PROJECT_ROOT")
                })?
                .join("repo")
                .join("pomdp-py"),
        };
        let package = overrides
            .package
            .clone()
            .or_else(|| snapshot.var("WHEELSHIP_PACKAGE").map(ToOwned::to_owned))
            .unwrap_or_else(|| DEFAULT_PACKAGE.to_string());
        Ok(Self {
            project: ProjectConfig {
                scan_dir: PathBuf::from(&package),
                root,
                package,
                test_entry: PathBuf::from(
                    snapshot
                        .var("WHEELSHIP_TEST_ENTRY")
                        .unwrap_or(DEFAULT_TEST_ENTRY),
                ),
            },
            python: PythonConfig {
                interpreter: snapshot.var("WHEELSHIP_PYTHON").map(ToOwned::to_owned),
            },
            container: ContainerConfig {
                backend: snapshot
                    .var("WHEELSHIP_CONTAINER_BACKEND")
                    .unwrap_or("docker")
                    .to_string(),
                image: snapshot
                    .var("WHEELSHIP_MANYLINUX_IMAGE")
                    .unwrap_or(DEFAULT_MANYLINUX_IMAGE)
                    .to_string(),
                mount_point: PathBuf::from(CONTAINER_MOUNT_POINT),
            },
            publish: PublishConfig {
                repository: overrides.repository.clone(),
            },
            process: ProcessConfig {
                max_capture_bytes: snapshot
                    .var("WHEELSHIP_MAX_CAPTURE_BYTES")
                    .and_then(|raw| raw.trim().parse::<usize>().ok())
                    .filter(|value| *value > 0)
                    .unwrap_or(DEFAULT_MAX_CAPTURE_BYTES),
            },
        })
    }

    #[must_use]
    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    #[must_use]
    pub fn python(&self) -> &PythonConfig {
        &self.python
    }

    #[must_use]
    pub fn container(&self) -> &ContainerConfig {
        &self.container
    }

    #[must_use]
    pub fn publish(&self) -> &PublishConfig {
        &self.publish
    }

    #[must_use]
    pub fn process(&self) -> &ProcessConfig {
        &self.process
    }

    #[must_use]
    pub fn container_backend(&self) -> ContainerBackend {
        ContainerBackend::from_name(&self.container.backend)
    }
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub package: String,
    /// Directory scanned for Cython sources, relative to `root`.
    pub scan_dir: PathBuf,
    /// Test-suite entry point, relative to `root`.
    pub test_entry: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PythonConfig {
    pub interpreter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub backend: String,
    pub image: String,
    pub mount_point: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub repository: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Bytes of output kept per stream of every external command.
    pub max_capture_bytes: usize,
}
