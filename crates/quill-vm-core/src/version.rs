//! Module versions

use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorCode, VmError};

/// Semantic version of a module, ordered by semver precedence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(semver::Version);

impl Version {
    /// Create a release version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Major component
    pub fn major(&self) -> u64 {
        self.0.major
    }

    /// Minor component
    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Patch component
    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Pre-release tag, if any
    pub fn tag(&self) -> Option<&str> {
        (!self.0.pre.is_empty()).then(|| self.0.pre.as_str())
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl FromStr for Version {
    type Err = VmError;

    /// Missing minor/patch components default to zero
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s.find(['-', '+']).unwrap_or(s.len());
        let (numbers, rest) = s.split_at(split);
        let padding = match numbers.matches('.').count() {
            0 => ".0.0",
            1 => ".0",
            _ => "",
        };
        semver::Version::parse(&format!("{numbers}{padding}{rest}"))
            .map(Self)
            .map_err(|err| {
                VmError::fatal(ErrorCode::TypeLoad, format!("Invalid version '{s}': {err}"))
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
