use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::env;
use crate::constants::fetch::{DEFAULT_CACHE_DIR, HUB_RETRIES};
use crate::constants::locator::{
    DEFAULT_ENDPOINT, DEFAULT_NAMESPACE, DEFAULT_REPO_ID, DEFAULT_REVISION,
};
use crate::errors::{DatasetError, Result};
use crate::types::Namespace;

/// Which contiguous block of ids the `first_*` configurations select.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FirstWindow {
    /// Ids `1..=N`.
    #[default]
    Leading,
    /// Ids `2..=N+1`, matching catalogs published by the reference loader.
    SkipFirst,
}

impl FromStr for FirstWindow {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leading" => Ok(FirstWindow::Leading),
            "skip-first" | "skip_first" => Ok(FirstWindow::SkipFirst),
            other => Err(DatasetError::Configuration(format!(
                "unknown first window mode '{other}' (expected 'leading' or 'skip-first')"
            ))),
        }
    }
}

/// Options consumed by `Catalog::build`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Seed for random-policy shard selection. `None` draws from OS entropy,
    /// so two catalogs built without a seed will usually disagree.
    pub seed: Option<u64>,
    /// Window used by `first_*` configurations.
    pub first_window: FirstWindow,
}

impl CatalogOptions {
    /// Options with a fixed seed and the default window.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

/// Settings shared by the bundled fetchers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchConfig {
    /// Root directory for downloads and extracted shards.
    pub cache_dir: PathBuf,
    /// Hub repository id, e.g. `poloclub/diffusiondb`.
    pub repo_id: String,
    /// Repository revision to download from.
    pub revision: String,
    /// Hub endpoint.
    pub endpoint: String,
    /// Download attempts performed by the Hub client.
    pub retries: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            repo_id: DEFAULT_REPO_ID.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retries: HUB_RETRIES,
        }
    }
}

/// Top-level configuration for building a dataset pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetConfig {
    /// Catalog construction options.
    pub catalog: CatalogOptions,
    /// Namespace the locator formats resource identifiers under.
    pub namespace: Namespace,
    /// Fetcher settings.
    pub fetch: FetchConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogOptions::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            fetch: FetchConfig::default(),
        }
    }
}

impl DatasetConfig {
    /// Build a config from `DIFFUSIONDB_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let value_of = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(raw) = value_of(env::SEED) {
            let seed = raw.trim().parse::<u64>().map_err(|_| {
                DatasetError::Configuration(format!("{} must be an unsigned integer, got '{raw}'", env::SEED))
            })?;
            config.catalog.seed = Some(seed);
        }
        if let Some(raw) = value_of(env::FIRST_WINDOW) {
            config.catalog.first_window = raw.parse()?;
        }
        if let Some(raw) = value_of(env::CACHE_DIR) {
            config.fetch.cache_dir = PathBuf::from(raw);
        }
        if let Some(raw) = value_of(env::NAMESPACE) {
            config.namespace = raw.trim().trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn from_lookup_uses_defaults_when_unset() {
        let config = DatasetConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, DatasetConfig::default());
        assert_eq!(config.catalog.seed, None);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn from_lookup_reads_overrides() {
        let config = DatasetConfig::from_lookup(lookup_from(&[
            (env::SEED, "1234"),
            (env::FIRST_WINDOW, "skip-first"),
            (env::CACHE_DIR, "/tmp/ddb"),
            (env::NAMESPACE, "http://mirror.local/ddb/"),
        ]))
        .unwrap();
        assert_eq!(config.catalog.seed, Some(1234));
        assert_eq!(config.catalog.first_window, FirstWindow::SkipFirst);
        assert_eq!(config.fetch.cache_dir, PathBuf::from("/tmp/ddb"));
        assert_eq!(config.namespace, "http://mirror.local/ddb");
    }

    #[test]
    fn from_lookup_rejects_bad_seed_and_window() {
        let err = DatasetConfig::from_lookup(lookup_from(&[(env::SEED, "abc")])).unwrap_err();
        assert!(matches!(err, DatasetError::Configuration(ref msg) if msg.contains(env::SEED)));

        let err =
            DatasetConfig::from_lookup(lookup_from(&[(env::FIRST_WINDOW, "middle")])).unwrap_err();
        assert!(matches!(err, DatasetError::Configuration(_)));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = DatasetConfig::from_lookup(lookup_from(&[(env::SEED, "  ")])).unwrap();
        assert_eq!(config.catalog.seed, None);
    }
}
