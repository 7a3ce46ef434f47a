//! Projection writer.
//!
//! Each package gets three documents under `<lowercase id>/`:
//! `latest.json`, `latest-stable.json` and `latest-prerelease.json`. Bodies
//! are compact JSON, gzip-compressed, stored with `Content-Encoding: gzip`
//! and `Cache-Control: no-store`.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use latest_storage::{BlobProperties, BlobStore};
use latest_types::{LatestResponse, LatestResponses};

use crate::error::IndexingError;

/// Which of the three documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatestVariant {
    /// Both slots
    Latest,
    /// Stable slot only
    Stable,
    /// Prerelease slot only
    Prerelease,
}

impl LatestVariant {
    /// All variants, in write order.
    pub const ALL: [LatestVariant; 3] = [
        LatestVariant::Latest,
        LatestVariant::Stable,
        LatestVariant::Prerelease,
    ];

    /// Document name without extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            LatestVariant::Latest => "latest",
            LatestVariant::Stable => "latest-stable",
            LatestVariant::Prerelease => "latest-prerelease",
        }
    }
}

impl fmt::Display for LatestVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LatestVariant {
    type Err = IndexingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(LatestVariant::Latest),
            "latest-stable" | "stable" => Ok(LatestVariant::Stable),
            "latest-prerelease" | "prerelease" => Ok(LatestVariant::Prerelease),
            other => Err(IndexingError::UnknownVariant(other.to_string())),
        }
    }
}

/// Blob name of a package's document.
pub fn blob_name(package_id: &str, variant: LatestVariant) -> String {
    document_path(package_id, variant.as_str())
}

fn document_path(package_id: &str, document: &str) -> String {
    format!("{}/{}.json", package_id.to_lowercase(), document)
}

/// Serialize and gzip a document.
pub fn encode(response: &LatestResponse) -> Result<Vec<u8>, IndexingError> {
    let json = serde_json::to_vec(response)?;
    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::best());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`encode`].
pub fn decode(bytes: &[u8]) -> Result<LatestResponse, IndexingError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Writes and reads the projection documents.
#[derive(Clone)]
pub struct LatestWriter {
    store: Arc<dyn BlobStore>,
}

impl LatestWriter {
    /// Create a writer over `store`.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Overwrite all three documents of `package_id`.
    ///
    /// Documents are written one after another; a failure leaves earlier
    /// documents updated and the caller retries the whole package.
    pub async fn write(
        &self,
        package_id: &str,
        responses: &LatestResponses,
    ) -> Result<(), IndexingError> {
        for (document, response) in responses.documents() {
            let name = document_path(package_id, document);
            let body = encode(response)?;
            let size = body.len();
            self.store
                .put(&name, body, BlobProperties::gzip_json_no_store())
                .await?;
            debug!(blob = %name, bytes = size, "Wrote latest document");
        }
        Ok(())
    }

    /// Read back one document, or `None` if it has never been written.
    pub async fn read(
        &self,
        package_id: &str,
        variant: LatestVariant,
    ) -> Result<Option<LatestResponse>, IndexingError> {
        let Some(blob) = self.store.get(&blob_name(package_id, variant)).await? else {
            return Ok(None);
        };

        if blob.properties.content_encoding.as_deref() == Some("gzip") {
            Ok(Some(decode(&blob.data)?))
        } else {
            Ok(Some(serde_json::from_slice(&blob.data)?))
        }
    }
}
