use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::info;

use super::archive::extract_archive;
use super::{ContentFetcher, extraction_target, namespace_segment, require_archive};
use crate::constants::fetch::{DOWNLOAD_BUFFER_BYTES, DOWNLOADS_DIR, PARTIAL_SUFFIX};
use crate::errors::{DatasetError, Result};
use crate::locator::ResourceId;

/// Fetcher that downloads `<base_url>/<path>` over plain HTTP(S).
///
/// Downloads land in `<cache_dir>/downloads` and are reused on later calls.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    base_url: String,
    cache_dir: PathBuf,
}

impl HttpFetcher {
    /// Fetcher for `base_url`, caching under `cache_dir`.
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache_dir: cache_dir.into(),
        }
    }

    /// URL a resource is downloaded from.
    pub fn url_for(&self, resource: &ResourceId) -> String {
        format!("{}/{}", self.base_url, resource.path())
    }

    fn download_target(&self, resource: &ResourceId) -> PathBuf {
        self.cache_dir
            .join(DOWNLOADS_DIR)
            .join(namespace_segment(resource))
            .join(resource.path())
    }

    fn stream_to(&self, resource: &ResourceId, url: &str, target: &Path) -> Result<()> {
        let parent = target.parent().unwrap_or(self.cache_dir.as_path());
        fs::create_dir_all(parent).map_err(|err| {
            DatasetError::unavailable(
                resource,
                format!("failed creating download dir {}: {err}", parent.display()),
            )
        })?;

        let response = ureq::get(url).call().map_err(|err| {
            DatasetError::unavailable(resource, format!("failed downloading '{url}': {err}"))
        })?;
        let mut reader = response.into_body().into_reader();
        let mut staging = tempfile::Builder::new()
            .prefix(".")
            .suffix(&format!(".{PARTIAL_SUFFIX}"))
            .tempfile_in(parent)
            .map_err(|err| {
                DatasetError::unavailable(
                    resource,
                    format!("failed creating partial file in {}: {err}", parent.display()),
                )
            })?;

        info!("[diffusiondb:fetch] downloading {url} -> {}", target.display());
        let started = Instant::now();
        let mut last_report = Instant::now();
        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; DOWNLOAD_BUFFER_BYTES];
        loop {
            let read = reader.read(&mut buffer).map_err(|err| {
                DatasetError::unavailable(resource, format!("failed reading '{url}': {err}"))
            })?;
            if read == 0 {
                break;
            }
            staging.write_all(&buffer[..read]).map_err(|err| {
                DatasetError::unavailable(
                    resource,
                    format!("failed writing partial download: {err}"),
                )
            })?;
            total_bytes = total_bytes.saturating_add(read as u64);
            if last_report.elapsed() >= Duration::from_secs(2) {
                info!(
                    "[diffusiondb:fetch] download progress {}: {:.1} MiB ({:.1}s)",
                    target.display(),
                    total_bytes as f64 / (1024.0 * 1024.0),
                    started.elapsed().as_secs_f64()
                );
                last_report = Instant::now();
            }
        }
        staging.persist(target).map_err(|err| {
            DatasetError::unavailable(
                resource,
                format!("failed moving download into {}: {err}", target.display()),
            )
        })?;
        info!(
            "[diffusiondb:fetch] download complete {}: {:.1} MiB in {:.1}s",
            target.display(),
            total_bytes as f64 / (1024.0 * 1024.0),
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

impl ContentFetcher for HttpFetcher {
    fn download(&self, resource: &ResourceId) -> Result<PathBuf> {
        let target = self.download_target(resource);
        if target.is_file() {
            return Ok(target);
        }
        let url = self.url_for(resource);
        self.stream_to(resource, &url, &target)?;
        Ok(target)
    }

    fn download_and_extract(&self, resource: &ResourceId) -> Result<PathBuf> {
        require_archive(resource)?;
        let target = extraction_target(&self.cache_dir, resource);
        if target.is_dir() {
            return Ok(target);
        }
        let archive = self.download(resource)?;
        extract_archive(resource, &archive, &target)
    }
}
