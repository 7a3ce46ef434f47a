//! Package version parsing and precedence.
//!
//! Versions follow SemVer 2.0 precedence. Registration listings also carry
//! legacy versions with two or four numeric parts (`1.0`, `1.0.0.1`), so the
//! numeric core accepts one to four parts; missing parts are zero and the
//! fourth part orders after patch. Prerelease labels compare
//! case-insensitively and build metadata never affects ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Prerelease;

use crate::error::LatestError;

/// A parsed package version with SemVer 2.0 ordering.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    pre: Prerelease,
    original: String,
}

impl PackageVersion {
    /// Parse a version string.
    pub fn parse(input: &str) -> Result<Self, LatestError> {
        let trimmed = input.trim();
        let invalid = || LatestError::InvalidVersion(input.to_string());

        let without_build = match trimmed.split_once('+') {
            Some((_, build)) if build.is_empty() => return Err(invalid()),
            Some((version, _)) => version,
            None => trimmed,
        };

        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 4 {
            return Err(invalid());
        }

        let mut numbers = [0u64; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        let pre = match pre {
            Some("") => return Err(invalid()),
            Some(label) => Prerelease::new(&label.to_ascii_lowercase()).map_err(|_| invalid())?,
            None => Prerelease::EMPTY,
        };

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            revision: numbers[3],
            pre,
            original: trimmed.to_string(),
        })
    }

    /// Whether this version carries a prerelease label.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// The version string as it was parsed.
    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl FromStr for PackageVersion {
    type Err = LatestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.revision)
            .cmp(&(other.major, other.minor, other.patch, other.revision))
            // semver's Prerelease ordering ranks the empty label above any label.
            .then_with(|| self.pre.cmp(&other.pre))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}
