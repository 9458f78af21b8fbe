use std::fmt;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::tags::AbiTag;
use crate::version::ReleaseVersion;

/// Components of a wheel filename:
/// `{distribution}-{version}(-{build})?-{python}-{abi}-{platform}.whl`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WheelFilename {
    pub distribution: String,
    pub version: String,
    pub build: Option<String>,
    pub python_tag: String,
    pub abi_tag: String,
    pub platform_tag: String,
}

impl WheelFilename {
    /// The filename a CPython build of `package` is expected to produce.
    pub fn predicted(
        package: &str,
        version: &ReleaseVersion,
        abi: AbiTag,
        platform: &str,
    ) -> Self {
        Self {
            distribution: package.to_string(),
            version: version.as_str().to_string(),
            build: None,
            python_tag: abi.to_string(),
            abi_tag: abi.to_string(),
            platform_tag: platform.to_string(),
        }
    }

    pub fn parse(filename: &str) -> Result<Self> {
        let Some(stem) = filename.strip_suffix(".whl") else {
            bail!("`{filename}` is not a wheel filename (missing .whl suffix)");
        };
        let parts: Vec<&str> = stem.split('-').collect();
        let (distribution, version, build, rest) = match parts.as_slice() {
            [dist, ver, py, abi, plat] => (*dist, *ver, None, [*py, *abi, *plat]),
            [dist, ver, build, py, abi, plat] => {
                (*dist, *ver, Some((*build).to_string()), [*py, *abi, *plat])
            }
            _ => bail!("`{filename}` does not have the expected number of wheel tag components"),
        };
        if parts.iter().any(|part| part.is_empty()) {
            bail!("`{filename}` contains an empty wheel tag component");
        }
        Ok(Self {
            distribution: distribution.to_string(),
            version: version.to_string(),
            build,
            python_tag: rest[0].to_string(),
            abi_tag: rest[1].to_string(),
            platform_tag: rest[2].to_string(),
        })
    }

    /// Identity check that ignores the platform tag, so the same check covers
    /// a wheel before and after repair.
    pub fn matches(&self, package: &str, version: &ReleaseVersion, abi: AbiTag) -> bool {
        let abi = abi.to_string();
        normalize_distribution(&self.distribution) == normalize_distribution(package)
            && self.version == version.as_str()
            && self.python_tag == abi
            && self.abi_tag == abi
    }
}

impl fmt::Display for WheelFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.distribution, self.version)?;
        if let Some(build) = &self.build {
            write!(f, "-{build}")?;
        }
        write!(
            f,
            "-{}-{}-{}.whl",
            self.python_tag, self.abi_tag, self.platform_tag
        )
    }
}

/// Source distribution name written by `python -m build`.
pub fn sdist_filename(package: &str, version: &ReleaseVersion) -> String {
    format!("{package}-{version}.tar.gz")
}

fn normalize_distribution(name: &str) -> String {
    name.to_ascii_lowercase().replace(['-', '.'], "_")
}
