//! Service index discovery.
//!
//! Resource URLs are resolved once per client. The first caller fetches the
//! service index; concurrent callers wait on the same initialization and a
//! failed fetch leaves the cell empty so a later call can retry.

use tokio::sync::OnceCell;
use tracing::info;

use latest_types::ServiceIndex;

use crate::client::JsonHttp;
use crate::error::ProtocolError;

/// Lazily fetched, shared service index.
#[derive(Debug)]
pub struct ServiceIndexClient {
    http: JsonHttp,
    url: String,
    index: OnceCell<ServiceIndex>,
}

impl ServiceIndexClient {
    /// Create a client for the service index at `url`.
    pub fn new(http: JsonHttp, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            index: OnceCell::new(),
        }
    }

    /// Service index URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The service index, fetched on first use.
    pub async fn get(&self) -> Result<&ServiceIndex, ProtocolError> {
        self.index
            .get_or_try_init(|| async {
                let index: ServiceIndex = self.http.get_json(&self.url).await?;
                info!(
                    url = %self.url,
                    resources = index.resources.len(),
                    "Loaded service index"
                );
                Ok::<_, ProtocolError>(index)
            })
            .await
    }

    /// URL of the first advertised resource matching `types`.
    pub async fn resource_url(&self, types: &[&str]) -> Result<String, ProtocolError> {
        let index = self.get().await?;
        index
            .resource_url(types)
            .map(str::to_string)
            .ok_or_else(|| ProtocolError::MissingResource(types.join(" | ")))
    }
}
