//! # latest-types
//!
//! Shared domain types for the catalog2latest indexer.
//!
//! This crate defines the data structures used throughout the system:
//! - Settings: layered configuration for the daemon and the job loop
//! - Catalog models: the catalog index, pages and leaves the producer reads
//! - Registration models: per-package version listings the worker ranks
//! - Latest documents: the projection written for every package
//! - Versions: parsing and precedence for package version strings
//!
//! ## Usage
//!
//! ```rust
//! use latest_types::PackageVersion;
//!
//! let stable: PackageVersion = "1.0.0".parse().unwrap();
//! let beta: PackageVersion = "1.0.0-beta".parse().unwrap();
//! assert!(stable > beta);
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod latest;
pub mod registration;
pub mod service_index;
pub mod version;

pub use catalog::{CatalogEventKind, CatalogIndex, CatalogLeafItem, CatalogPage, CatalogPageItem};
pub use config::Settings;
pub use error::LatestError;
pub use latest::{LatestResponse, LatestResponses, PackageMetadata};
pub use registration::{RegistrationIndex, RegistrationLeaf, RegistrationPage};
pub use service_index::{ServiceIndex, ServiceIndexResource};
pub use version::PackageVersion;
