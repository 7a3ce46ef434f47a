//! End-to-end test infrastructure for catalog2latest.
//!
//! Provides a shared TestHarness with an in-memory catalog, in-memory
//! registrations and a filesystem blob store, plus helpers to run passes and
//! read back the stored documents.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use flate2::read::GzDecoder;

use latest_indexing::{
    HttpCatalogProducer, JobConfig, LatestJob, LatestVariant, LatestWriter,
    PackageMetadataWorker, RetryPolicy,
};
use latest_protocol::{CatalogSource, ProtocolError, RegistrationSource};
use latest_storage::{BlobCursor, BlobStore, CursorStore, FsBlobStore};
use latest_types::{
    CatalogIndex, CatalogLeafItem, CatalogPage, CatalogPageItem, LatestResponse, PackageMetadata,
    RegistrationIndex, RegistrationLeaf, RegistrationPage,
};

const BASE_URL: &str = "https://catalog.test";

/// Timestamp on 2021-01-`day` at `hour`:00 UTC.
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, day, hour, 0, 0)
        .single()
        .expect("valid test timestamp")
}

fn not_found(url: &str) -> ProtocolError {
    ProtocolError::Status {
        url: url.to_string(),
        status: 404,
    }
}

/// In-memory catalog that grows as tests commit pages.
#[derive(Default)]
pub struct FakeCatalog {
    pages: Mutex<Vec<(CatalogPageItem, CatalogPage)>>,
    page_requests: Mutex<Vec<String>>,
}

impl FakeCatalog {
    /// Append a page of `(package id, version, commit timestamp)` leaves.
    pub fn commit_page(&self, leaves: &[(&str, &str, DateTime<Utc>)]) {
        let mut pages = self.pages.lock().expect("catalog lock");
        let url = format!("{}/catalog/page{}.json", BASE_URL, pages.len());
        let items: Vec<CatalogLeafItem> = leaves
            .iter()
            .map(|(id, version, ts)| CatalogLeafItem {
                url: format!("{}/catalog/data/{}.{}.json", BASE_URL, id.to_lowercase(), version),
                leaf_type: "nuget:PackageDetails".to_string(),
                commit_timestamp: *ts,
                package_id: id.to_string(),
                package_version: version.to_string(),
            })
            .collect();
        let commit = items
            .iter()
            .map(|leaf| leaf.commit_timestamp)
            .max()
            .expect("page needs at least one leaf");

        pages.push((
            CatalogPageItem {
                url,
                commit_timestamp: commit,
                count: items.len(),
            },
            CatalogPage {
                commit_timestamp: commit,
                count: items.len(),
                leaves: items,
            },
        ));
    }

    /// Page URLs requested so far, in request order.
    pub fn page_requests(&self) -> Vec<String> {
        self.page_requests.lock().expect("catalog lock").clone()
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn get_index(&self) -> Result<CatalogIndex, ProtocolError> {
        let pages = self.pages.lock().expect("catalog lock");
        Ok(CatalogIndex {
            commit_timestamp: pages
                .iter()
                .map(|(item, _)| item.commit_timestamp)
                .max()
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            count: pages.len(),
            pages: pages.iter().map(|(item, _)| item.clone()).collect(),
        })
    }

    async fn get_page(&self, url: &str) -> Result<CatalogPage, ProtocolError> {
        self.page_requests
            .lock()
            .expect("catalog lock")
            .push(url.to_string());
        let pages = self.pages.lock().expect("catalog lock");
        pages
            .iter()
            .find(|(item, _)| item.url == url)
            .map(|(_, page)| page.clone())
            .ok_or_else(|| not_found(url))
    }
}

/// In-memory registrations.
///
/// With a page size set, every package's versions are split into referenced
/// (non-inlined) pages of that size.
#[derive(Default)]
pub struct FakeRegistrations {
    packages: Mutex<HashMap<String, Vec<PackageMetadata>>>,
    page_size: Option<usize>,
    failures: Mutex<HashMap<String, usize>>,
}

impl FakeRegistrations {
    /// Registrations split into referenced pages of `page_size` versions.
    pub fn paged(page_size: usize) -> Self {
        Self {
            page_size: Some(page_size.max(1)),
            ..Default::default()
        }
    }

    /// Replace the versions of `package_id`.
    pub fn set_versions(&self, package_id: &str, versions: &[(&str, bool)]) {
        let metadata = versions
            .iter()
            .map(|(version, listed)| {
                PackageMetadata::new(*version, *listed)
                    .with_property("id", serde_json::json!(package_id))
            })
            .collect();
        self.packages
            .lock()
            .expect("registration lock")
            .insert(package_id.to_lowercase(), metadata);
    }

    /// Make the next `count` index requests for `package_id` fail with a 503.
    pub fn fail_next(&self, package_id: &str, count: usize) {
        self.failures
            .lock()
            .expect("registration lock")
            .insert(package_id.to_lowercase(), count);
    }

    fn base(package_id: &str) -> String {
        format!("{}/registration/{}", BASE_URL, package_id.to_lowercase())
    }

    fn leaves(package_id: &str, versions: &[PackageMetadata]) -> Vec<RegistrationLeaf> {
        versions
            .iter()
            .map(|metadata| RegistrationLeaf {
                url: format!("{}/{}.json", Self::base(package_id), metadata.version),
                catalog_entry: metadata.clone(),
            })
            .collect()
    }

    fn pages(&self, package_id: &str, versions: &[PackageMetadata]) -> Vec<RegistrationPage> {
        let chunk = self.page_size.unwrap_or(versions.len().max(1));
        versions
            .chunks(chunk)
            .enumerate()
            .map(|(n, chunk)| RegistrationPage {
                url: format!("{}/page/{}.json", Self::base(package_id), n),
                count: chunk.len(),
                lower: chunk.first().map(|m| m.version.clone()),
                upper: chunk.last().map(|m| m.version.clone()),
                leaves: Some(Self::leaves(package_id, chunk)),
            })
            .collect()
    }

    fn take_failure(&self, key: &str) -> bool {
        let mut failures = self.failures.lock().expect("registration lock");
        match failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl RegistrationSource for FakeRegistrations {
    async fn get_index(&self, package_id: &str) -> Result<Option<RegistrationIndex>, ProtocolError> {
        let key = package_id.to_lowercase();
        if self.take_failure(&key) {
            return Err(ProtocolError::Status {
                url: format!("{}/index.json", Self::base(package_id)),
                status: 503,
            });
        }

        let packages = self.packages.lock().expect("registration lock");
        let Some(versions) = packages.get(&key) else {
            return Ok(None);
        };

        let mut pages = self.pages(package_id, versions);
        if self.page_size.is_some() {
            for page in &mut pages {
                page.leaves = None;
            }
        }
        Ok(Some(RegistrationIndex {
            url: format!("{}/index.json", Self::base(package_id)),
            count: pages.len(),
            pages,
        }))
    }

    async fn get_page(&self, url: &str) -> Result<RegistrationPage, ProtocolError> {
        let packages = self.packages.lock().expect("registration lock");
        for (package_id, versions) in packages.iter() {
            if let Some(page) = self
                .pages(package_id, versions)
                .into_iter()
                .find(|page| page.url == url)
            {
                return Ok(page);
            }
        }
        Err(not_found(url))
    }
}

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Blob container under the temp dir
    pub store: Arc<FsBlobStore>,
    /// Catalog the producer reads
    pub catalog: Arc<FakeCatalog>,
    /// Registrations the workers read
    pub registrations: Arc<FakeRegistrations>,
}

impl TestHarness {
    /// Harness whose registrations are fully inlined.
    pub fn new() -> Self {
        Self::with_registrations(FakeRegistrations::default())
    }

    /// Harness over the given registrations.
    pub fn with_registrations(registrations: FakeRegistrations) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            FsBlobStore::new(temp_dir.path(), "latest").expect("Failed to open blob store"),
        );

        Self {
            _temp_dir: temp_dir,
            store,
            catalog: Arc::new(FakeCatalog::default()),
            registrations: Arc::new(registrations),
        }
    }

    /// Job config tuned for tests: small pool, small channel, short sleep.
    pub fn config(&self) -> JobConfig {
        JobConfig::default()
            .with_consumer_workers(4)
            .with_channel_capacity(4)
            .with_sleep_duration(Duration::from_secs(30))
    }

    /// Build a job over the harness fakes.
    pub fn job(&self, config: JobConfig) -> LatestJob {
        self.job_with(self.catalog.clone(), self.registrations.clone(), config)
    }

    /// Build a job over the harness store and the given sources.
    pub fn job_with(
        &self,
        catalog: Arc<dyn CatalogSource>,
        registrations: Arc<dyn RegistrationSource>,
        config: JobConfig,
    ) -> LatestJob {
        let producer = HttpCatalogProducer::new(catalog, 4);
        let worker = PackageMetadataWorker::new(
            registrations,
            LatestWriter::new(self.store.clone()),
            RetryPolicy::fixed(Duration::from_secs(5)),
        );
        LatestJob::new(
            Arc::new(BlobCursor::new(self.store.clone())),
            Arc::new(producer),
            Arc::new(worker),
            config,
        )
    }

    /// The persisted cursor.
    pub async fn cursor(&self) -> Option<DateTime<Utc>> {
        BlobCursor::new(self.store.clone())
            .get()
            .await
            .expect("Failed to read cursor")
    }

    /// Overwrite the persisted cursor.
    pub async fn set_cursor(&self, value: DateTime<Utc>) {
        BlobCursor::new(self.store.clone())
            .set(value)
            .await
            .expect("Failed to write cursor");
    }

    /// A stored document, decoded.
    pub async fn document(&self, package_id: &str, variant: LatestVariant) -> Option<LatestResponse> {
        LatestWriter::new(self.store.clone())
            .read(package_id, variant)
            .await
            .expect("Failed to read document")
    }

    /// A stored document's JSON text, as it was before compression.
    pub async fn document_json(&self, package_id: &str, variant: LatestVariant) -> Option<String> {
        let name = latest_indexing::writer::blob_name(package_id, variant);
        let blob = self.store.get(&name).await.expect("Failed to read blob")?;
        let mut json = String::new();
        GzDecoder::new(blob.data.as_slice())
            .read_to_string(&mut json)
            .expect("document is not gzip");
        Some(json)
    }

    /// Names of all stored package documents (the cursor excluded).
    pub fn document_names(&self) -> Vec<String> {
        let mut names = self.store.names().expect("Failed to list blobs");
        names.retain(|name| name != latest_storage::CURSOR_BLOB_NAME);
        names
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
