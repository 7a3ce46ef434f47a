//! Registration inlining and latest-version ranking.

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use latest_protocol::RegistrationSource;
use latest_types::{LatestResponses, PackageMetadata, PackageVersion, RegistrationIndex};

use crate::cancel::or_cancelled;
use crate::error::IndexingError;

/// Make every page of `index` carry its leaves.
///
/// Pages already inlined are kept as they are; referenced pages are fetched
/// concurrently and put back in their original position.
pub async fn inline_registration_index(
    source: &dyn RegistrationSource,
    mut index: RegistrationIndex,
    token: &CancellationToken,
) -> Result<RegistrationIndex, IndexingError> {
    if index.is_fully_inlined() {
        return Ok(index);
    }

    let missing: Vec<(usize, String)> = index
        .pages
        .iter()
        .enumerate()
        .filter(|(_, page)| !page.is_inlined())
        .map(|(position, page)| (position, page.url.clone()))
        .collect();
    debug!(index = %index.url, pages = missing.len(), "Fetching registration pages");

    let fetched = or_cancelled(
        token,
        try_join_all(missing.iter().map(|(_, url)| source.get_page(url))),
    )
    .await?;

    for ((position, url), page) in missing.into_iter().zip(fetched) {
        if !page.is_inlined() {
            return Err(IndexingError::InvalidListing(format!(
                "registration page {} has no items",
                url
            )));
        }
        index.pages[position] = page;
    }

    Ok(index)
}

/// Pick the latest listed stable and prerelease versions of a fully inlined
/// registration index.
///
/// Versions that fail to parse are skipped. When versions compare equal the
/// one listed first wins.
pub fn rank(index: &RegistrationIndex) -> LatestResponses {
    let mut listed: Vec<(PackageVersion, &PackageMetadata)> = index
        .metadata()
        .filter(|metadata| metadata.is_listed())
        .filter_map(|metadata| match metadata.parse_version() {
            Ok(version) => Some((version, metadata)),
            Err(e) => {
                warn!(index = %index.url, version = %metadata.version, error = %e, "Skipping unparsable version");
                None
            }
        })
        .collect();

    // Stable sort keeps listing order among equal versions.
    listed.sort_by(|(a, _), (b, _)| b.cmp(a));

    let prerelease = listed.first().map(|(_, metadata)| (*metadata).clone());
    let stable = listed
        .iter()
        .find(|(version, _)| !version.is_prerelease())
        .map(|(_, metadata)| (*metadata).clone());

    LatestResponses::new(stable, prerelease)
}
