//! Registration (package metadata) resource models.
//!
//! A registration index lists pages. Small packages embed every page's leaves
//! directly in the index; large packages only reference pages by URL and the
//! caller must fetch them.

use serde::{Deserialize, Serialize};

use crate::latest::PackageMetadata;

/// The registration index for one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationIndex {
    /// Index URL
    #[serde(rename = "@id", default)]
    pub url: String,

    /// Number of pages
    #[serde(default)]
    pub count: usize,

    /// Pages, in the order the service returned them
    #[serde(rename = "items", default)]
    pub pages: Vec<RegistrationPage>,
}

impl RegistrationIndex {
    /// Whether every page embeds its leaves.
    pub fn is_fully_inlined(&self) -> bool {
        self.pages.iter().all(RegistrationPage::is_inlined)
    }

    /// Metadata of every leaf across all inlined pages, in page order.
    pub fn metadata(&self) -> impl Iterator<Item = &PackageMetadata> {
        self.pages
            .iter()
            .flat_map(|page| page.leaves.iter().flatten())
            .map(|leaf| &leaf.catalog_entry)
    }
}

/// A registration page, embedded in the index or fetched on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationPage {
    /// Page URL
    #[serde(rename = "@id")]
    pub url: String,

    /// Number of leaves in the page
    #[serde(default)]
    pub count: usize,

    /// Lowest version in the page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<String>,

    /// Highest version in the page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<String>,

    /// Leaves, or `None` when the page is only referenced
    #[serde(rename = "items", default, skip_serializing_if = "Option::is_none")]
    pub leaves: Option<Vec<RegistrationLeaf>>,
}

impl RegistrationPage {
    /// Whether the leaves are present.
    pub fn is_inlined(&self) -> bool {
        self.leaves.is_some()
    }
}

/// One package version inside a registration page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationLeaf {
    /// Leaf URL
    #[serde(rename = "@id", default)]
    pub url: String,

    /// The version's metadata
    #[serde(rename = "catalogEntry")]
    pub catalog_entry: PackageMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mixed_inlined_and_referenced_pages() {
        let index: RegistrationIndex = serde_json::from_value(json!({
            "@id": "https://example.test/reg/foo/index.json",
            "count": 2,
            "items": [
                {
                    "@id": "https://example.test/reg/foo/page/1.0.0/1.0.0.json",
                    "count": 1,
                    "lower": "1.0.0",
                    "upper": "1.0.0",
                    "items": [
                        {"@id": "https://example.test/reg/foo/1.0.0.json", "catalogEntry": {"version": "1.0.0", "listed": true}}
                    ]
                },
                {
                    "@id": "https://example.test/reg/foo/page/2.0.0/3.0.0.json",
                    "count": 2,
                    "lower": "2.0.0",
                    "upper": "3.0.0"
                }
            ]
        }))
        .unwrap();

        assert!(!index.is_fully_inlined());
        assert!(index.pages[0].is_inlined());
        assert!(!index.pages[1].is_inlined());

        let versions: Vec<&str> = index.metadata().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, vec!["1.0.0"]);
    }

    #[test]
    fn test_empty_index_is_fully_inlined() {
        let index = RegistrationIndex {
            url: String::new(),
            count: 0,
            pages: Vec::new(),
        };
        assert!(index.is_fully_inlined());
        assert_eq!(index.metadata().count(), 0);
    }
}
