//! Catalog reader.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use latest_types::service_index::CATALOG_RESOURCE_TYPES;
use latest_types::{CatalogIndex, CatalogPage};

use crate::client::JsonHttp;
use crate::error::ProtocolError;
use crate::service_index::ServiceIndexClient;

/// Source of catalog documents.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the catalog index.
    async fn get_index(&self) -> Result<CatalogIndex, ProtocolError>;

    /// Fetch one catalog page by URL.
    async fn get_page(&self, url: &str) -> Result<CatalogPage, ProtocolError>;
}

/// Catalog reader over HTTP.
pub struct HttpCatalogClient {
    http: JsonHttp,
    service_index: Arc<ServiceIndexClient>,
    index_url: OnceCell<String>,
}

impl HttpCatalogClient {
    /// Create a client that discovers the catalog through `service_index`.
    pub fn new(http: JsonHttp, service_index: Arc<ServiceIndexClient>) -> Self {
        Self {
            http,
            service_index,
            index_url: OnceCell::new(),
        }
    }

    async fn index_url(&self) -> Result<&str, ProtocolError> {
        self.index_url
            .get_or_try_init(|| self.service_index.resource_url(CATALOG_RESOURCE_TYPES))
            .await
            .map(String::as_str)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    async fn get_index(&self) -> Result<CatalogIndex, ProtocolError> {
        let url = self.index_url().await?;
        self.http.get_json(url).await
    }

    async fn get_page(&self, url: &str) -> Result<CatalogPage, ProtocolError> {
        self.http.get_json(url).await
    }
}
