//! Application version numbers.
//!
//! Update documents carry either semantic versions (`2.1.3`, `2.1.3-beta.1`)
//! or four-part assembly versions (`1.0.0.0`). [`Version`] accepts both: the
//! fourth part is a revision number ordered after the patch number. Missing
//! trailing parts count as zero, so `2.1` equals `2.1.0` and `2.1.0.0`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::UpdateError;

/// Maximum number of dot-separated numeric parts.
const MAX_PARTS: usize = 4;

/// A version with an optional fourth (revision) part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    base: semver::Version,
    revision: u64,
}

impl Version {
    /// Create a three-part version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self::with_revision(major, minor, patch, 0)
    }

    /// Create a four-part version.
    pub const fn with_revision(major: u64, minor: u64, patch: u64, revision: u64) -> Self {
        Self {
            base: semver::Version::new(major, minor, patch),
            revision,
        }
    }

    /// Parse a version string.
    ///
    /// One to four numeric parts are accepted, optionally followed by a
    /// semver pre-release (`-beta.1`) or build (`+abc`) suffix.
    pub fn parse(s: &str) -> Result<Self, UpdateError> {
        let s = s.trim();
        let (core, suffix) = match s.find(['-', '+']) {
            Some(at) => s.split_at(at),
            None => (s, ""),
        };

        let parts: Vec<&str> = core.split('.').collect();
        let numeric = parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
        if !numeric || parts.len() > MAX_PARTS {
            // Let semver describe what is wrong
            return Ok(semver::Version::parse(s)?.into());
        }

        let part = |i: usize| parts.get(i).copied().unwrap_or("0");
        let base = semver::Version::parse(&format!(
            "{}.{}.{}{}",
            part(0),
            part(1),
            part(2),
            suffix
        ))?;
        let revision = part(3)
            .parse::<u64>()
            .map_err(|e| UpdateError::VersionParseError(format!("revision `{}`: {}", part(3), e)))?;

        Ok(Self { base, revision })
    }

    pub fn major(&self) -> u64 {
        self.base.major
    }

    pub fn minor(&self) -> u64 {
        self.base.minor
    }

    pub fn patch(&self) -> u64 {
        self.base.patch
    }

    /// Fourth part; zero when the version had three parts or fewer.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Check if this is a pre-release version.
    pub fn is_prerelease(&self) -> bool {
        !self.base.pre.is_empty()
    }
}

impl From<semver::Version> for Version {
    fn from(base: semver::Version) -> Self {
        Self { base, revision: 0 }
    }
}

impl FromStr for Version {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let key = |v: &Self| (v.base.major, v.base.minor, v.base.patch, v.revision);
        key(self)
            .cmp(&key(other))
            .then_with(|| self.base.cmp(&other.base))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.base.major, self.base.minor, self.base.patch)?;
        if self.revision != 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !self.base.pre.is_empty() {
            write!(f, "-{}", self.base.pre)?;
        }
        if !self.base.build.is_empty() {
            write!(f, "+{}", self.base.build)?;
        }
        Ok(())
    }
}

/// Parse a version string, padding short numeric forms like `2` or `2.1`.
pub fn parse_version(s: &str) -> Result<Version, UpdateError> {
    Version::parse(s)
}
