use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};
use tracing::{info, warn};

use super::archive::extract_archive;
use super::{ContentFetcher, extraction_target, require_archive};
use crate::config::FetchConfig;
use crate::errors::{DatasetError, Result};
use crate::locator::ResourceId;

const HUB_DATASET_PREFIX: &str = "datasets/";

/// Fetcher that downloads through the Hugging Face Hub client.
///
/// Raw files live in the hub client's cache under `<cache_dir>/hub`; archives
/// are extracted under `<cache_dir>/extracted`.
pub struct HubFetcher {
    config: FetchConfig,
    api: Api,
}

impl HubFetcher {
    /// Build the hf-hub client from `config`.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let api = ApiBuilder::new()
            .with_progress(false)
            .with_retries(config.retries)
            .with_endpoint(config.endpoint.clone())
            .with_cache_dir(config.cache_dir.join("hub"))
            .with_token(None)
            .build()
            .map_err(|err| DatasetError::Configuration(format!("failed building hf-hub client: {err}")))?;
        Ok(Self { config, api })
    }

    /// Repository id for a resource, taken from its namespace when it names a
    /// dataset repo and from the fetch config otherwise.
    fn repo_id_for(&self, resource: &ResourceId) -> String {
        resource
            .namespace()
            .strip_prefix(HUB_DATASET_PREFIX)
            .map(ToString::to_string)
            .unwrap_or_else(|| self.config.repo_id.clone())
    }
}

impl ContentFetcher for HubFetcher {
    fn download(&self, resource: &ResourceId) -> Result<PathBuf> {
        let repo = Repo::with_revision(
            self.repo_id_for(resource),
            RepoType::Dataset,
            self.config.revision.clone(),
        );
        let repo_api = self.api.repo(repo);
        info!("[diffusiondb:fetch] resolving {resource} via hf-hub");

        let mut local = repo_api.get(resource.path()).map_err(|err| {
            DatasetError::unavailable(resource, format!("hf-hub download failed: {err}"))
        })?;
        if !local.exists() {
            warn!(
                "[diffusiondb:fetch] hf-hub returned a missing cache path for {resource}; forcing download"
            );
            for _ in 0..self.config.retries.max(1) {
                local = repo_api.download(resource.path()).map_err(|err| {
                    DatasetError::unavailable(resource, format!("hf-hub forced download failed: {err}"))
                })?;
                if local.exists() {
                    break;
                }
                thread::sleep(Duration::from_millis(400));
            }
        }
        if !local.exists() {
            return Err(DatasetError::unavailable(
                resource,
                format!("hf-hub returned non-existent cache file {}", local.display()),
            ));
        }
        Ok(local)
    }

    fn download_and_extract(&self, resource: &ResourceId) -> Result<PathBuf> {
        require_archive(resource)?;
        let target = extraction_target(&self.config.cache_dir, resource);
        if target.is_dir() {
            return Ok(target);
        }
        let archive = self.download(resource)?;
        extract_archive(resource, &archive, &target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ShardId;
    use crate::locator::ShardLocator;
    use tempfile::tempdir;

    fn fetcher(cache_dir: PathBuf) -> HubFetcher {
        HubFetcher::new(FetchConfig {
            cache_dir,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn repo_id_comes_from_dataset_namespace() {
        let dir = tempdir().unwrap();
        let fetcher = fetcher(dir.path().to_path_buf());
        let hub = ShardLocator::default().locate_metadata();
        assert_eq!(fetcher.repo_id_for(&hub), "poloclub/diffusiondb");

        let custom = ShardLocator::new("datasets/someone/fork").locate_metadata();
        assert_eq!(fetcher.repo_id_for(&custom), "someone/fork");

        let other = ShardLocator::new("mirror").locate_metadata();
        assert_eq!(fetcher.repo_id_for(&other), "poloclub/diffusiondb");
    }

    #[test]
    fn cached_extraction_skips_network() {
        let dir = tempdir().unwrap();
        let fetcher = fetcher(dir.path().to_path_buf());
        let resource = ShardLocator::default().locate(ShardId::new(1).unwrap());
        let target = extraction_target(dir.path(), &resource);
        std::fs::create_dir_all(&target).unwrap();
        assert_eq!(fetcher.download_and_extract(&resource).unwrap(), target);
    }

    #[test]
    #[ignore = "network integration test against the live Hugging Face Hub"]
    fn downloads_live_shard() {
        let dir = tempdir().unwrap();
        let fetcher = fetcher(dir.path().to_path_buf());
        let resource = ShardLocator::default().locate(ShardId::new(1).unwrap());
        let extracted = fetcher.download_and_extract(&resource).unwrap();
        assert!(extracted.join("part-000001.json").is_file());
    }
}
