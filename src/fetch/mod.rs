//! Content fetchers: turn remote resource identifiers into local paths.
//!
//! The pipeline treats fetching as an external collaborator. It only relies on
//! the [`ContentFetcher`] contract:
//! - `download` returns a local file for any resource;
//! - `download_and_extract` returns a fully extracted directory for shard
//!   archives (a partially extracted shard is never returned);
//! - failures are reported as `DatasetError::ResourceUnavailable` and are
//!   passed through the pipeline unchanged.
//!
//! Retries, timeouts, and parallelism belong to implementations.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::data::ShardId;
use crate::errors::{DatasetError, Result};
use crate::locator::{ResourceId, ShardLocator};

/// Archive extraction shared by the bundled fetchers.
pub mod archive;
/// HTTP mirror fetcher.
pub mod http;
/// Hugging Face Hub fetcher.
#[cfg(feature = "huggingface")]
pub mod hub;
/// Local mirror fetcher.
pub mod local;

pub use http::HttpFetcher;
#[cfg(feature = "huggingface")]
pub use hub::HubFetcher;
pub use local::LocalFetcher;

/// Downloads and extracts resources to local paths.
pub trait ContentFetcher: Send + Sync {
    /// Fetch a resource and return the local file path.
    fn download(&self, resource: &ResourceId) -> Result<PathBuf>;

    /// Fetch an archive resource and return its extracted directory.
    fn download_and_extract(&self, resource: &ResourceId) -> Result<PathBuf>;

    /// Warm the local cache for several resources at once.
    ///
    /// The default implementation fetches in parallel and stops at the first
    /// failure it observes.
    fn prefetch(&self, resources: &[ResourceId]) -> Result<()> {
        resources.par_iter().try_for_each(|resource| {
            if resource.is_archive() {
                self.download_and_extract(resource).map(drop)
            } else {
                self.download(resource).map(drop)
            }
        })
    }
}

/// A located shard and, once fetched, its local files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardResource {
    /// Shard this resource belongs to.
    pub shard_id: ShardId,
    /// Remote identifier of the shard archive.
    pub resource: ResourceId,
    /// Extracted directory, set after fetching.
    pub extracted_dir: Option<PathBuf>,
    /// Parameter sidecar inside `extracted_dir`, set after fetching.
    pub sidecar_path: Option<PathBuf>,
}

impl ShardResource {
    /// Locate a shard without touching the filesystem.
    pub fn located(locator: &ShardLocator, shard_id: ShardId) -> Self {
        Self {
            shard_id,
            resource: locator.locate(shard_id),
            extracted_dir: None,
            sidecar_path: None,
        }
    }

    /// Describe an already-extracted shard directory.
    pub fn extracted(resource: ResourceId, shard_id: ShardId, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            shard_id,
            sidecar_path: Some(dir.join(ShardLocator::sidecar_filename(shard_id))),
            extracted_dir: Some(dir),
            resource,
        }
    }

    /// Fetch and extract the shard archive.
    pub fn fetch(self, fetcher: &dyn ContentFetcher) -> Result<Self> {
        let dir = fetcher.download_and_extract(&self.resource)?;
        debug!(
            "[diffusiondb:fetch] shard {} extracted at {}",
            self.shard_id,
            dir.display()
        );
        Ok(Self::extracted(self.resource, self.shard_id, dir))
    }

    /// Whether the shard has local files.
    pub fn is_fetched(&self) -> bool {
        self.extracted_dir.is_some() && self.sidecar_path.is_some()
    }
}

/// Cache subdirectory for a namespace, safe to use as a single path segment.
pub(crate) fn namespace_segment(resource: &ResourceId) -> String {
    resource
        .namespace()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Directory an archive resource extracts into under `cache_dir`.
pub(crate) fn extraction_target(cache_dir: &Path, resource: &ResourceId) -> PathBuf {
    cache_dir
        .join(crate::constants::fetch::EXTRACTED_DIR)
        .join(namespace_segment(resource))
        .join(resource.stem())
}

pub(crate) fn require_archive(resource: &ResourceId) -> Result<()> {
    if resource.is_archive() {
        Ok(())
    } else {
        Err(DatasetError::unavailable(
            resource,
            "resource is not an archive and cannot be extracted",
        ))
    }
}
