//! HTTP protocol clients for catalog2latest.
//!
//! - [`ServiceIndexClient`]: resolves resource URLs from the service index, once
//! - [`HttpCatalogClient`]: reads the catalog index and catalog pages
//! - [`HttpRegistrationClient`]: reads per-package registration indexes and pages
//! - [`ProtocolClients`]: builds all of the above over one shared HTTP client
//!
//! The [`CatalogSource`] and [`RegistrationSource`] traits are the seams the
//! indexing pipeline depends on, so tests can substitute in-memory fakes.

pub mod catalog;
pub mod client;
pub mod error;
pub mod registration;
pub mod service_index;

pub use catalog::{CatalogSource, HttpCatalogClient};
pub use client::{JsonHttp, ProtocolClients};
pub use error::ProtocolError;
pub use registration::{HttpRegistrationClient, RegistrationSource};
pub use service_index::ServiceIndexClient;
