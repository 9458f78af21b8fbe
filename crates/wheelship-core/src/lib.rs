#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

mod core;

pub(crate) use crate::core::config;
pub(crate) use crate::core::container;
pub(crate) use crate::core::distribution;
pub(crate) use crate::core::python::python_sys;
pub(crate) use crate::core::runtime::{effects, process};

pub use crate::core::config::context::CommandContext;
pub use crate::core::config::{
    Config, ConfigOverrides, ContainerConfig, ProcessConfig, ProjectConfig, PublishConfig,
    PythonConfig,
};
pub use crate::core::container::{BackendKind, ContainerBackend, ContainerRun, Mount};
pub use crate::core::release::{release, ReleaseRequest, ReleaseStage};
pub use crate::core::runtime::effects::{
    ContainerRuntime, Effects, FileSystem, HeadState, PythonRuntime, SharedEffects,
    SystemEffects, VersionControl,
};
pub use crate::core::runtime::process::RunOutput;
pub use crate::core::tooling::outcome::{
    format_status_message, to_json_response, CommandStatus, ExecutionOutcome, ReleaseError,
};

pub use wheelship_domain::ReleaseVersion;
