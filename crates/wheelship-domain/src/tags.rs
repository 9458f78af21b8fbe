use std::fmt;

use serde::Serialize;

/// Platform tag setuptools stamps on wheels built directly on a Linux host.
pub const LINUX_PLATFORM: &str = "linux_x86_64";

/// Platform tag auditwheel writes when repairing against the manylinux2014 policy.
pub const MANYLINUX_PLATFORM: &str = "manylinux_2_17_x86_64.manylinux2014_x86_64";

/// CPython ABI tag such as `cp311`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AbiTag {
    major: u32,
    minor: u32,
}

impl AbiTag {
    pub const fn cpython(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parses `cp<major><minor>`; the major version is a single digit.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix("cp")?;
        if digits.len() < 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let (major, minor) = digits.split_at(1);
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }

    pub fn major(self) -> u32 {
        self.major
    }

    pub fn minor(self) -> u32 {
        self.minor
    }
}

impl fmt::Display for AbiTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cp{}{}", self.major, self.minor)
    }
}

impl Serialize for AbiTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// True when every component of a (possibly compressed) platform tag is a
/// manylinux tag.
pub fn is_manylinux_platform(platform: &str) -> bool {
    !platform.is_empty()
        && platform
            .split('.')
            .all(|component| component.starts_with("manylinux"))
}
