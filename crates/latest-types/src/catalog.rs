//! Catalog resource models.
//!
//! The catalog is an append-only log: an index lists pages, each page lists
//! leaves, and every object carries the commit timestamp it was written at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The catalog index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogIndex {
    /// Commit timestamp of the most recent page
    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: DateTime<Utc>,

    /// Number of pages
    #[serde(default)]
    pub count: usize,

    /// Page references
    #[serde(rename = "items", default)]
    pub pages: Vec<CatalogPageItem>,
}

impl CatalogIndex {
    /// Pages holding at least one commit after `min`, oldest first.
    pub fn pages_after(&self, min: DateTime<Utc>) -> Vec<CatalogPageItem> {
        let mut pages: Vec<CatalogPageItem> = self
            .pages
            .iter()
            .filter(|page| page.commit_timestamp > min)
            .cloned()
            .collect();
        pages.sort_by_key(|page| page.commit_timestamp);
        pages
    }
}

/// A page reference inside the catalog index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPageItem {
    /// Page URL
    #[serde(rename = "@id")]
    pub url: String,

    /// Latest commit timestamp of any leaf in the page
    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: DateTime<Utc>,

    /// Number of leaves in the page
    #[serde(default)]
    pub count: usize,
}

/// A catalog page document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPage {
    /// Page commit timestamp
    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: DateTime<Utc>,

    /// Number of leaves
    #[serde(default)]
    pub count: usize,

    /// Leaf references
    #[serde(rename = "items", default)]
    pub leaves: Vec<CatalogLeafItem>,
}

impl CatalogPage {
    /// Leaves with `min < commit <= max`, oldest first.
    pub fn leaves_within(&self, min: DateTime<Utc>, max: DateTime<Utc>) -> Vec<CatalogLeafItem> {
        let mut leaves: Vec<CatalogLeafItem> = self
            .leaves
            .iter()
            .filter(|leaf| leaf.commit_timestamp > min && leaf.commit_timestamp <= max)
            .cloned()
            .collect();
        leaves.sort_by_key(|leaf| leaf.commit_timestamp);
        leaves
    }
}

/// A single package mutation in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogLeafItem {
    /// Leaf URL
    #[serde(rename = "@id")]
    pub url: String,

    /// Leaf type, e.g. `nuget:PackageDetails`
    #[serde(rename = "@type")]
    pub leaf_type: String,

    /// When the mutation was committed
    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: DateTime<Utc>,

    /// Package identifier
    #[serde(rename = "nuget:id")]
    pub package_id: String,

    /// Package version
    #[serde(rename = "nuget:version")]
    pub package_version: String,
}

impl CatalogLeafItem {
    /// Classify the leaf.
    pub fn kind(&self) -> CatalogEventKind {
        CatalogEventKind::from_type(&self.leaf_type)
    }
}

/// Kind of catalog mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogEventKind {
    /// A package version was added or edited
    Details,
    /// A package version was deleted
    Delete,
    /// Anything else; still triggers reprocessing
    Other,
}

impl CatalogEventKind {
    /// Map a catalog `@type` value.
    pub fn from_type(leaf_type: &str) -> Self {
        match leaf_type {
            "nuget:PackageDetails" | "PackageDetails" => CatalogEventKind::Details,
            "nuget:PackageDelete" | "PackageDelete" => CatalogEventKind::Delete,
            _ => CatalogEventKind::Other,
        }
    }
}

impl std::fmt::Display for CatalogEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogEventKind::Details => write!(f, "details"),
            CatalogEventKind::Delete => write!(f, "delete"),
            CatalogEventKind::Other => write!(f, "other"),
        }
    }
}
