//! Registration (package metadata) reader.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use latest_types::service_index::REGISTRATION_RESOURCE_TYPES;
use latest_types::{RegistrationIndex, RegistrationPage};

use crate::client::JsonHttp;
use crate::error::ProtocolError;
use crate::service_index::ServiceIndexClient;

/// Source of per-package version listings.
#[async_trait]
pub trait RegistrationSource: Send + Sync {
    /// Fetch a package's registration index, or `None` if the package does not exist.
    async fn get_index(&self, package_id: &str) -> Result<Option<RegistrationIndex>, ProtocolError>;

    /// Fetch a referenced registration page.
    async fn get_page(&self, url: &str) -> Result<RegistrationPage, ProtocolError>;
}

/// Registration reader over HTTP.
pub struct HttpRegistrationClient {
    http: JsonHttp,
    service_index: Arc<ServiceIndexClient>,
    base_url: OnceCell<String>,
}

impl HttpRegistrationClient {
    /// Create a client that discovers the registration base URL through `service_index`.
    pub fn new(http: JsonHttp, service_index: Arc<ServiceIndexClient>) -> Self {
        Self {
            http,
            service_index,
            base_url: OnceCell::new(),
        }
    }

    async fn base_url(&self) -> Result<&str, ProtocolError> {
        self.base_url
            .get_or_try_init(|| self.service_index.resource_url(REGISTRATION_RESOURCE_TYPES))
            .await
            .map(String::as_str)
    }

    /// Registration index URL for `package_id`.
    pub async fn index_url(&self, package_id: &str) -> Result<String, ProtocolError> {
        let base = self.base_url().await?;
        Ok(format!("{}/{}/index.json", base, package_id.to_lowercase()))
    }
}

#[async_trait]
impl RegistrationSource for HttpRegistrationClient {
    async fn get_index(&self, package_id: &str) -> Result<Option<RegistrationIndex>, ProtocolError> {
        let url = self.index_url(package_id).await?;
        self.http.get_json_or_none(&url).await
    }

    async fn get_page(&self, url: &str) -> Result<RegistrationPage, ProtocolError> {
        self.http.get_json(url).await
    }
}
