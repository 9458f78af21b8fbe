use std::sync::{Arc, OnceLock};

use anyhow::Result;

use crate::config::{Config, ConfigOverrides};
use crate::effects::{self, SharedEffects, SystemEffects};
use crate::python_sys::detect_interpreter;

pub struct CommandContext {
    config: Config,
    python: OnceLock<String>,
    effects: SharedEffects,
}

impl CommandContext {
    /// Creates a context backed by the real git, container, and python tools.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be assembled.
    pub fn new(overrides: &ConfigOverrides) -> Result<Self> {
        let config = Config::from_env(overrides)?;
        let effects: SharedEffects = Arc::new(SystemEffects::new(
            config.container_backend(),
            config.process().max_capture_bytes,
        ));
        Ok(Self::with_effects(config, effects))
    }

    #[must_use]
    pub fn with_effects(config: Config, effects: SharedEffects) -> Self {
        Self {
            config,
            python: OnceLock::new(),
            effects,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn git(&self) -> &dyn effects::VersionControl {
        self.effects.git()
    }

    pub fn containers(&self) -> &dyn effects::ContainerRuntime {
        self.effects.containers()
    }

    pub fn python_runtime(&self) -> &dyn effects::PythonRuntime {
        self.effects.python()
    }

    pub fn fs(&self) -> &dyn effects::FileSystem {
        self.effects.fs()
    }

    /// The interpreter every python step runs with, resolved once.
    ///
    /// # Errors
    /// Returns an error when no interpreter is configured or on `PATH`.
    pub fn python(&self) -> Result<&str> {
        if let Some(python) = self.python.get() {
            return Ok(python.as_str());
        }
        let detected = detect_interpreter(self.config.python().interpreter.as_deref())?;
        Ok(self.python.get_or_init(|| detected).as_str())
    }
}
