//! Command implementations for catalog2latest.
//!
//! Handles:
//! - run: bootstrap the container, then run passes until a shutdown signal
//! - once: a single pass
//! - package: recompute one package
//! - cursor show/set: inspect or reset the cursor
//! - show: print a stored document

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use latest_indexing::{
    HttpCatalogProducer, IndexingError, JobConfig, LatestJob, LatestVariant, LatestWriter,
    PackageMetadataWorker, PassResult, ProcessOutcome, RetryPolicy,
};
use latest_protocol::ProtocolClients;
use latest_storage::{BlobCursor, BlobStore, CursorStore, FsBlobStore};
use latest_types::{LatestResponse, Settings};

use crate::cli::Cli;

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli, max_pages: Option<usize>) -> Result<Settings> {
    let settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(settings, cli, max_pages)
}

/// Apply CLI overrides on top of loaded settings, then validate.
fn apply_overrides(mut settings: Settings, cli: &Cli, max_pages: Option<usize>) -> Result<Settings> {
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    if let Some(url) = &cli.service_index_url {
        settings.service_index_url = url.clone();
    }
    if let Some(path) = &cli.storage_path {
        settings.storage_path = path.clone();
    }
    if max_pages.is_some() {
        settings.max_pages = max_pages;
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn open_store(settings: &Settings) -> Result<Arc<FsBlobStore>> {
    let store = FsBlobStore::new(settings.expanded_storage_path(), &settings.container)
        .context("Invalid blob container")?;
    Ok(Arc::new(store))
}

async fn bootstrap_store(settings: &Settings) -> Result<Arc<FsBlobStore>> {
    let store = open_store(settings)?;
    let created = store
        .ensure_container()
        .await
        .context("Failed to create blob container")?;
    info!(container = %store.describe(), created, "Blob container ready");
    Ok(store)
}

fn build_job(settings: &Settings, store: Arc<FsBlobStore>) -> Result<LatestJob> {
    let clients = ProtocolClients::new(&settings.service_index_url, settings.http_timeout())
        .context("Failed to create HTTP clients")?;
    debug!(service_index = %clients.service_index.url(), "Protocol clients ready");

    let producer = HttpCatalogProducer::new(clients.catalog.clone(), settings.producer_workers);
    let worker = PackageMetadataWorker::new(
        clients.registration.clone(),
        LatestWriter::new(store.clone()),
        RetryPolicy::from_settings(settings),
    );

    Ok(LatestJob::new(
        Arc::new(BlobCursor::new(store)),
        Arc::new(producer),
        Arc::new(worker),
        JobConfig::from_settings(settings),
    ))
}

/// Cancel `token` on Ctrl+C or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, shutting down...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down...");
            }
        }
        token.cancel();
    });
}

/// Run passes until a shutdown signal arrives.
pub async fn run_service(settings: Settings) -> Result<()> {
    info!("catalog2latest starting...");
    info!("Configuration:");
    info!("  Service index: {}", settings.service_index_url);
    info!("  Storage path: {}", settings.expanded_storage_path().display());
    info!("  Container: {}", settings.container);
    info!("  Workers: {} producer, {} consumer", settings.producer_workers, settings.consumer_workers);

    let store = bootstrap_store(&settings).await?;
    let job = build_job(&settings, store)?;

    let token = CancellationToken::new();
    spawn_shutdown_listener(token.clone());

    job.run(token).await.context("Job failed")?;
    info!("catalog2latest stopped");
    Ok(())
}

/// Run one pass. Returns `None` if it was interrupted by a shutdown signal.
pub async fn run_once(settings: Settings) -> Result<Option<PassResult>> {
    let store = bootstrap_store(&settings).await?;
    let job = build_job(&settings, store)?;

    let token = CancellationToken::new();
    spawn_shutdown_listener(token.clone());

    match job.run_pass(&token).await {
        Ok(result) => Ok(Some(result)),
        Err(IndexingError::Cancelled) => Ok(None),
        Err(e) => Err(e).context("Pass failed"),
    }
}

/// Recompute one package immediately.
pub async fn process_package(settings: Settings, package_id: &str) -> Result<ProcessOutcome> {
    let store = bootstrap_store(&settings).await?;
    let job = build_job(&settings, store)?;

    let token = CancellationToken::new();
    spawn_shutdown_listener(token.clone());

    job.process_package(package_id, &token)
        .await
        .with_context(|| format!("Failed to process {}", package_id))
}

/// Read the persisted cursor.
pub async fn show_cursor(settings: &Settings) -> Result<Option<DateTime<Utc>>> {
    let cursor = BlobCursor::new(open_store(settings)?);
    cursor.get().await.context("Failed to read cursor")
}

/// Overwrite the cursor with an RFC 3339 timestamp.
pub async fn set_cursor(settings: &Settings, timestamp: &str) -> Result<DateTime<Utc>> {
    let value = DateTime::parse_from_rfc3339(timestamp)
        .with_context(|| format!("Invalid timestamp '{}'", timestamp))?
        .with_timezone(&Utc);

    let cursor = BlobCursor::new(bootstrap_store(settings).await?);
    cursor.set(value).await.context("Failed to write cursor")?;
    Ok(value)
}

/// Read and decompress one stored document.
pub async fn show_document(
    settings: &Settings,
    package_id: &str,
    variant: &str,
) -> Result<Option<LatestResponse>> {
    let variant: LatestVariant = variant.parse()?;
    let writer = LatestWriter::new(open_store(settings)?);
    writer
        .read(package_id, variant)
        .await
        .with_context(|| format!("Failed to read {} document for {}", variant, package_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use latest_types::{LatestResponses, PackageMetadata};

    fn settings(dir: &std::path::Path) -> Settings {
        Settings {
            storage_path: dir.to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cursor_set_then_show() {
        let temp = tempfile::tempdir().unwrap();
        let settings = settings(temp.path());

        assert_eq!(show_cursor(&settings).await.unwrap(), None);

        let value = set_cursor(&settings, "2024-02-03T04:05:06+01:00").await.unwrap();
        assert_eq!(value.to_rfc3339(), "2024-02-03T03:05:06+00:00");
        assert_eq!(show_cursor(&settings).await.unwrap(), Some(value));
        assert!(temp.path().join("latest").join("cursor.json").is_file());
    }

    #[tokio::test]
    async fn test_set_cursor_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let settings = settings(temp.path());
        assert!(set_cursor(&settings, "yesterday").await.is_err());
        assert_eq!(show_cursor(&settings).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_show_document() {
        let temp = tempfile::tempdir().unwrap();
        let settings = settings(temp.path());

        assert!(show_document(&settings, "Foo.Bar", "latest").await.unwrap().is_none());

        let writer = LatestWriter::new(bootstrap_store(&settings).await.unwrap());
        writer
            .write(
                "Foo.Bar",
                &LatestResponses::new(Some(PackageMetadata::new("1.0.0", true)), None),
            )
            .await
            .unwrap();

        let document = show_document(&settings, "foo.bar", "latest-stable")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(document.stable.unwrap().version, "1.0.0");
        assert!(show_document(&settings, "Foo.Bar", "newest").await.is_err());
    }

    #[test]
    fn test_cli_overrides_apply() {
        let cli = Cli::parse_from([
            "catalog2latest",
            "--log-level",
            "debug",
            "--service-index-url",
            "http://localhost:1234/v3/index.json",
            "--storage-path",
            "/tmp/c2l-test",
            "once",
        ]);
        let settings = apply_overrides(Settings::default(), &cli, Some(7)).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.service_index_url, "http://localhost:1234/v3/index.json");
        assert_eq!(settings.storage_path, "/tmp/c2l-test");
        assert_eq!(settings.max_pages, Some(7));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = Cli::parse_from(["catalog2latest", "--service-index-url", "nope", "run"]);
        assert!(apply_overrides(Settings::default(), &cli, None).is_err());
    }

    #[test]
    fn test_unset_overrides_keep_loaded_values() {
        let loaded = Settings {
            log_level: "warn".to_string(),
            max_pages: Some(3),
            ..Settings::default()
        };
        let cli = Cli::parse_from(["catalog2latest", "run"]);

        let settings = apply_overrides(loaded, &cli, None).unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.max_pages, Some(3));
    }
}
