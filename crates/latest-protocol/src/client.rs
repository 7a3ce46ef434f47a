//! Shared HTTP plumbing and client construction.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::catalog::HttpCatalogClient;
use crate::error::ProtocolError;
use crate::registration::HttpRegistrationClient;
use crate::service_index::ServiceIndexClient;

/// Thin JSON-over-HTTP helper around a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct JsonHttp {
    client: Client,
}

impl JsonHttp {
    /// Build a client with the given request timeout.
    ///
    /// Gzip response decompression is enabled.
    pub fn new(timeout: Duration) -> Result<Self, ProtocolError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(concat!("catalog2latest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProtocolError::Config(e.to_string()))?;

        Ok(Self { client })
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProtocolError> {
        self.get_json_or_none(url).await?.ok_or_else(|| ProtocolError::Status {
            url: url.to_string(),
            status: StatusCode::NOT_FOUND.as_u16(),
        })
    }

    /// GET `url` and decode the JSON body, mapping 404 to `None`.
    pub async fn get_json_or_none<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, ProtocolError> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProtocolError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ProtocolError::Deserialize {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

/// All protocol clients, sharing one HTTP client and one service index.
#[derive(Clone)]
pub struct ProtocolClients {
    /// Resource discovery
    pub service_index: Arc<ServiceIndexClient>,
    /// Catalog reader
    pub catalog: Arc<HttpCatalogClient>,
    /// Registration reader
    pub registration: Arc<HttpRegistrationClient>,
}

impl ProtocolClients {
    /// Build clients for the service index at `service_index_url`.
    pub fn new(service_index_url: &str, timeout: Duration) -> Result<Self, ProtocolError> {
        let http = JsonHttp::new(timeout)?;
        let service_index = Arc::new(ServiceIndexClient::new(http.clone(), service_index_url));

        info!(service_index = %service_index_url, "Created protocol clients");

        Ok(Self {
            catalog: Arc::new(HttpCatalogClient::new(http.clone(), service_index.clone())),
            registration: Arc::new(HttpRegistrationClient::new(http, service_index.clone())),
            service_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> JsonHttp {
        JsonHttp::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_json_or_none_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result: Option<Value> = http()
            .get_json_or_none(&format!("{}/missing.json", server.uri()))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_json_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result: Result<Value, _> = http().get_json(&format!("{}/broken.json", server.uri())).await;
        assert!(matches!(result, Err(ProtocolError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_get_json_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/garbage.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result: Result<Value, _> = http().get_json(&format!("{}/garbage.json", server.uri())).await;
        assert!(matches!(result, Err(ProtocolError::Deserialize { .. })));
    }

    #[tokio::test]
    async fn test_get_json_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1})))
            .mount(&server)
            .await;

        let value: Value = http().get_json(&format!("{}/ok.json", server.uri())).await.unwrap();
        assert_eq!(value, json!({"a": 1}));
    }
}
