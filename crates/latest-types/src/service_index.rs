//! Service index model used for resource discovery.

use serde::{Deserialize, Serialize};

/// Catalog resource type.
pub const CATALOG_RESOURCE_TYPES: &[&str] = &["Catalog/3.0.0"];

/// Registration resource types, most preferred first.
pub const REGISTRATION_RESOURCE_TYPES: &[&str] = &[
    "RegistrationsBaseUrl/3.6.0",
    "RegistrationsBaseUrl/3.4.0",
    "RegistrationsBaseUrl/3.0.0-rc",
    "RegistrationsBaseUrl/3.0.0-beta",
    "RegistrationsBaseUrl",
];

/// The service index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceIndex {
    /// Protocol version
    #[serde(default)]
    pub version: String,

    /// Advertised resources
    #[serde(default)]
    pub resources: Vec<ServiceIndexResource>,
}

/// A single advertised resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceIndexResource {
    /// Resource URL
    #[serde(rename = "@id")]
    pub url: String,

    /// Resource type
    #[serde(rename = "@type")]
    pub resource_type: String,
}

impl ServiceIndex {
    /// URL of the first resource matching `types`, honouring their order.
    pub fn resource_url(&self, types: &[&str]) -> Option<&str> {
        types.iter().find_map(|wanted| {
            self.resources
                .iter()
                .find(|r| r.resource_type == *wanted)
                .map(|r| r.url.trim_end_matches('/'))
        })
    }
}
