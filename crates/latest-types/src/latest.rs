//! The "latest" projection documents.

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LatestError;
use crate::version::PackageVersion;

/// Registration convention: unlisted packages are published in 1900.
const UNLISTED_PUBLISHED_YEAR: i32 = 1900;

/// Metadata for a single package version.
///
/// Only `version` and `listed` are interpreted; every other property of the
/// registration catalog entry is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// The package version string
    pub version: String,

    /// Explicit listed flag, when the registration entry carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed: Option<bool>,

    /// All remaining properties, forwarded as-is
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl PackageMetadata {
    /// Create metadata with only a version and listed flag.
    pub fn new(version: impl Into<String>, listed: bool) -> Self {
        Self {
            version: version.into(),
            listed: Some(listed),
            properties: Map::new(),
        }
    }

    /// Attach an extra pass-through property.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Whether this version is visible.
    ///
    /// Falls back to the `published` date when no explicit flag exists.
    pub fn is_listed(&self) -> bool {
        if let Some(listed) = self.listed {
            return listed;
        }

        self.properties
            .get("published")
            .and_then(Value::as_str)
            .and_then(|published| DateTime::parse_from_rfc3339(published).ok())
            .map(|published| published.year() != UNLISTED_PUBLISHED_YEAR)
            .unwrap_or(true)
    }

    /// Parse the version string.
    pub fn parse_version(&self) -> Result<PackageVersion, LatestError> {
        PackageVersion::parse(&self.version)
    }
}

/// A "latest" document.
///
/// Absent slots are omitted from the JSON entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestResponse {
    /// The metadata for the package's latest listed stable version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable: Option<PackageMetadata>,

    /// The metadata for the package's latest listed version, including prereleases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerelease: Option<PackageMetadata>,
}

/// The three documents derived from one ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestResponses {
    /// Both slots as computed
    pub latest: LatestResponse,
    /// Stable slot only
    pub latest_stable: LatestResponse,
    /// Prerelease slot only
    pub latest_prerelease: LatestResponse,
}

impl LatestResponses {
    /// Derive the three documents from a ranking result.
    pub fn new(stable: Option<PackageMetadata>, prerelease: Option<PackageMetadata>) -> Self {
        Self {
            latest: LatestResponse {
                stable: stable.clone(),
                prerelease: prerelease.clone(),
            },
            latest_stable: LatestResponse {
                stable,
                prerelease: None,
            },
            latest_prerelease: LatestResponse {
                stable: None,
                prerelease,
            },
        }
    }

    /// The documents paired with the blob name each is stored under.
    pub fn documents(&self) -> [(&'static str, &LatestResponse); 3] {
        [
            ("latest", &self.latest),
            ("latest-stable", &self.latest_stable),
            ("latest-prerelease", &self.latest_prerelease),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_passthrough_roundtrip() {
        let raw = json!({
            "@id": "https://example.test/foo.bar/1.0.0.json",
            "id": "Foo.Bar",
            "version": "1.0.0",
            "authors": "someone",
            "tags": ["a", "b"]
        });

        let metadata: PackageMetadata = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(metadata.version, "1.0.0");
        assert_eq!(metadata.listed, None);
        assert_eq!(metadata.properties["id"], json!("Foo.Bar"));

        let back = serde_json::to_value(&metadata).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_is_listed_explicit_flag() {
        assert!(PackageMetadata::new("1.0.0", true).is_listed());
        assert!(!PackageMetadata::new("1.0.0", false).is_listed());
    }

    #[test]
    fn test_is_listed_from_published() {
        let unlisted: PackageMetadata = serde_json::from_value(json!({
            "version": "1.0.0",
            "published": "1900-01-01T00:00:00+00:00"
        }))
        .unwrap();
        assert!(!unlisted.is_listed());

        let listed: PackageMetadata = serde_json::from_value(json!({
            "version": "1.0.0",
            "published": "2021-03-04T05:06:07.123+00:00"
        }))
        .unwrap();
        assert!(listed.is_listed());

        let no_date = PackageMetadata {
            version: "1.0.0".to_string(),
            listed: None,
            properties: Map::new(),
        };
        assert!(no_date.is_listed());
    }

    #[test]
    fn test_absent_slots_omitted() {
        let empty = serde_json::to_string(&LatestResponse::default()).unwrap();
        assert_eq!(empty, "{}");

        let responses = LatestResponses::new(
            Some(PackageMetadata::new("1.0.0", true)),
            Some(PackageMetadata::new("1.1.0-beta", true)),
        );

        let stable_only = serde_json::to_value(&responses.latest_stable).unwrap();
        assert!(stable_only.get("prerelease").is_none());
        assert_eq!(stable_only["stable"]["version"], json!("1.0.0"));

        let prerelease_only = serde_json::to_value(&responses.latest_prerelease).unwrap();
        assert!(prerelease_only.get("stable").is_none());
        assert_eq!(prerelease_only["prerelease"]["version"], json!("1.1.0-beta"));

        let combined = serde_json::to_value(&responses.latest).unwrap();
        assert!(combined.get("stable").is_some());
        assert!(combined.get("prerelease").is_some());
    }

    #[test]
    fn test_document_names() {
        let responses = LatestResponses::default();
        let names: Vec<&str> = responses.documents().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["latest", "latest-stable", "latest-prerelease"]);
    }
}
