//! Daemon version strings.
//!
//! Accepted forms:
//! - `9.2.0`
//! - `9.2.0.r42` (revision since the release tag)
//! - `9.2.0.r42.g1a2b3c4` (plus abbreviated commit)
//!
//! Ordering looks at `(major, minor, patch, revision)`; the commit is
//! informational only.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed daemon version.
#[derive(Debug, Clone)]
pub struct Version {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
    /// Commits since the release tag.
    pub revision: Option<u32>,
    /// Abbreviated commit hash.
    pub commit: Option<String>,
}

/// A version string did not match any accepted form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version string: {0:?}")]
pub struct ParseVersionError(String);

impl Version {
    /// Creates a plain `major.minor.patch` version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: None,
            commit: None,
        }
    }

    /// Parses a version string.
    pub fn parse(input: &str) -> Result<Self, ParseVersionError> {
        let err = || ParseVersionError(input.to_owned());
        let mut parts = input.split('.');

        let mut number = || {
            parts
                .next()
                .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|p| p.parse::<u32>().ok())
                .ok_or_else(err)
        };
        let major = number()?;
        let minor = number()?;
        let patch = number()?;

        let mut version = Self::new(major, minor, patch);
        let mut rest = parts.peekable();

        if let Some(rev) = rest.next_if(|p| p.starts_with('r')) {
            let digits = &rev[1..];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            version.revision = Some(digits.parse().map_err(|_| err())?);

            if let Some(commit) = rest.next_if(|p| p.starts_with('g')) {
                let hash = &commit[1..];
                if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(err());
                }
                version.commit = Some(hash.to_owned());
            }
        }

        if rest.next().is_some() {
            return Err(err());
        }
        Ok(version)
    }

    /// Ordering key.
    fn key(&self) -> (u32, u32, u32, u32) {
        (self.major, self.minor, self.patch, self.revision.unwrap_or(0))
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(rev) = self.revision {
            write!(f, ".r{rev}")?;
            if let Some(commit) = &self.commit {
                write!(f, ".g{commit}")?;
            }
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}
