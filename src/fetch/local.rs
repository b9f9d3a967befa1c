use std::path::{Path, PathBuf};

use tracing::debug;

use super::archive::extract_archive;
use super::{ContentFetcher, extraction_target, require_archive};
use crate::errors::{DatasetError, Result};
use crate::locator::ResourceId;

/// Fetcher backed by a local mirror of the repository layout.
///
/// Resources resolve to `<root>/<path>`. For shard archives, a directory named
/// after the archive stem next to it (`images/part-000001/`) is used as an
/// already-extracted shard; otherwise the archive is extracted under
/// `<cache_dir>/extracted`.
#[derive(Clone, Debug)]
pub struct LocalFetcher {
    root: PathBuf,
    cache_dir: PathBuf,
}

impl LocalFetcher {
    /// Fetcher reading from `root`, extracting into `cache_dir`.
    pub fn new(root: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Mirror root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local_path(&self, resource: &ResourceId) -> PathBuf {
        self.root.join(resource.path())
    }

    fn pre_extracted_dir(&self, resource: &ResourceId) -> Option<PathBuf> {
        let archive = self.local_path(resource);
        let dir = archive.parent()?.join(resource.stem());
        dir.is_dir().then_some(dir)
    }
}

impl ContentFetcher for LocalFetcher {
    fn download(&self, resource: &ResourceId) -> Result<PathBuf> {
        let path = self.local_path(resource);
        if path.is_file() {
            Ok(path)
        } else {
            Err(DatasetError::unavailable(
                resource,
                format!("no local mirror file at {}", path.display()),
            ))
        }
    }

    fn download_and_extract(&self, resource: &ResourceId) -> Result<PathBuf> {
        require_archive(resource)?;
        if let Some(dir) = self.pre_extracted_dir(resource) {
            debug!(
                "[diffusiondb:fetch] using pre-extracted shard {}",
                dir.display()
            );
            return Ok(dir);
        }
        let target = extraction_target(&self.cache_dir, resource);
        if target.is_dir() {
            return Ok(target);
        }
        let archive = self.download(resource)?;
        extract_archive(resource, &archive, &target)
    }
}
