use std::fmt;
use std::str::FromStr;

use pep440_rs::Version;
use serde::Serialize;

const BRANCH_PREFIX: &str = "dev-";

/// The version string a release is cut for, kept exactly as the user typed it.
///
/// Filenames and the release branch are derived from the raw string; nothing
/// here normalizes `1.3.3` into `1.3.3.0` or similar.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the branch a release of this version must be built from.
    pub fn branch_name(&self) -> String {
        format!("{BRANCH_PREFIX}{}", self.0)
    }

    /// Exact, case-sensitive comparison against the release branch name.
    pub fn is_release_branch(&self, branch: &str) -> bool {
        branch == self.branch_name()
    }

    pub fn is_pep440(&self) -> bool {
        Version::from_str(&self.0).is_ok()
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
