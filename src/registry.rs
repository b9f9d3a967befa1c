//! Catalog of named configurations.
//!
//! The catalog is built once by [`Catalog::build`]. Random-policy
//! configurations draw their shards at build time, so resolving the same
//! configuration twice on one catalog always yields the same ids. Pass a seed
//! through [`CatalogOptions`] to make the draw reproducible across builds.

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use tracing::debug;

use crate::config::{CatalogOptions, FirstWindow};
use crate::constants::registry::{
    ALL_CONFIG_NAME, DEFAULT_CONFIG_NAME, IMAGES_PER_SHARD, SHARD_ID_MAX, TEXT_ONLY_CONFIG_NAME,
};
use crate::data::{ExampleKind, ShardId};
use crate::errors::{DatasetError, Result};
use crate::types::ConfigName;

/// How a configuration picks its shards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelectionPolicy {
    /// A contiguous ascending block of ids.
    First,
    /// Ids drawn uniformly without replacement.
    Random,
    /// Every shard.
    All,
    /// No shards; read the consolidated table instead.
    TextOnly,
}

impl SelectionPolicy {
    /// Policy name as used in configuration names.
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionPolicy::First => "first",
            SelectionPolicy::Random => "random",
            SelectionPolicy::All => ALL_CONFIG_NAME,
            SelectionPolicy::TextOnly => TEXT_ONLY_CONFIG_NAME,
        }
    }
}

/// Advertised configuration size, counted in images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetSize {
    /// 1,000 images.
    K1,
    /// 5,000 images.
    K5,
    /// 10,000 images.
    K10,
    /// 50,000 images.
    K50,
    /// 100,000 images.
    K100,
    /// 500,000 images.
    K500,
    /// 1,000,000 images.
    M1,
}

impl TargetSize {
    /// Sizes offered for the `first` and `random` policies, smallest first.
    pub const ALL: [TargetSize; 7] = [
        TargetSize::K1,
        TargetSize::K5,
        TargetSize::K10,
        TargetSize::K50,
        TargetSize::K100,
        TargetSize::K500,
        TargetSize::M1,
    ];

    /// Number of shards needed to cover this size.
    pub const fn shard_count(self) -> usize {
        match self {
            TargetSize::K1 => 1,
            TargetSize::K5 => 5,
            TargetSize::K10 => 10,
            TargetSize::K50 => 50,
            TargetSize::K100 => 100,
            TargetSize::K500 => 500,
            TargetSize::M1 => 1000,
        }
    }

    /// Advertised image count.
    pub const fn images(self) -> u64 {
        self.shard_count() as u64 * IMAGES_PER_SHARD
    }

    /// Suffix used in configuration names (`1k`, `1m`).
    pub const fn label(self) -> &'static str {
        match self {
            TargetSize::K1 => "1k",
            TargetSize::K5 => "5k",
            TargetSize::K10 => "10k",
            TargetSize::K50 => "50k",
            TargetSize::K100 => "100k",
            TargetSize::K500 => "500k",
            TargetSize::M1 => "1m",
        }
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named, fully resolved shard selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    name: ConfigName,
    policy: SelectionPolicy,
    size: Option<TargetSize>,
    description: String,
    shard_ids: Vec<ShardId>,
}

impl Configuration {
    /// Catalog name, e.g. `random_1k`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Selection policy.
    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Advertised size for `first`/`random` configurations.
    pub fn size(&self) -> Option<TargetSize> {
        self.size
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Resolved shard ids in iteration order.
    pub fn shard_ids(&self) -> &[ShardId] {
        &self.shard_ids
    }

    /// Record shape this configuration emits.
    pub fn kind(&self) -> ExampleKind {
        match self.policy {
            SelectionPolicy::TextOnly => ExampleKind::Text,
            _ => ExampleKind::Image,
        }
    }

    /// Number of images covered by the selected shards.
    pub fn target_images(&self) -> u64 {
        self.shard_ids.len() as u64 * IMAGES_PER_SHARD
    }
}

/// Immutable set of configurations.
#[derive(Clone, Debug)]
pub struct Catalog {
    configs: Vec<Configuration>,
}

impl Catalog {
    /// Build the full catalog.
    pub fn build(options: &CatalogOptions) -> Self {
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut configs = Vec::with_capacity(TargetSize::ALL.len() * 2 + 2);
        for size in TargetSize::ALL {
            configs.push(Configuration {
                name: format!("first_{size}"),
                policy: SelectionPolicy::First,
                size: Some(size),
                description: format!(
                    "The first {size} images in this dataset with their prompts and parameters"
                ),
                shard_ids: first_window(size.shard_count(), options.first_window),
            });
            configs.push(Configuration {
                name: format!("random_{size}"),
                policy: SelectionPolicy::Random,
                size: Some(size),
                description: format!("Random {size} images with their prompts and parameters"),
                shard_ids: random_selection(&mut rng, size.shard_count()),
            });
        }
        configs.push(Configuration {
            name: ALL_CONFIG_NAME.to_string(),
            policy: SelectionPolicy::All,
            size: None,
            description: "All images with their prompts and parameters".to_string(),
            shard_ids: ShardId::all().collect(),
        });
        configs.push(Configuration {
            name: TEXT_ONLY_CONFIG_NAME.to_string(),
            policy: SelectionPolicy::TextOnly,
            size: None,
            description: "Only include all prompts and parameters (no image)".to_string(),
            shard_ids: Vec::new(),
        });

        debug!(
            "[diffusiondb:registry] built catalog with {} configurations (seeded={}, first_window={:?})",
            configs.len(),
            options.seed.is_some(),
            options.first_window
        );
        Self { configs }
    }

    /// Look up a configuration by name.
    pub fn get(&self, name: &str) -> Result<&Configuration> {
        self.configs
            .iter()
            .find(|config| config.name == name)
            .ok_or_else(|| DatasetError::ConfigurationNotFound {
                name: name.to_string(),
            })
    }

    /// Resolve a configuration name to its ordered shard ids.
    pub fn resolve(&self, name: &str) -> Result<&[ShardId]> {
        self.get(name).map(Configuration::shard_ids)
    }

    /// Every configuration in catalog order.
    pub fn list_configs(&self) -> &[Configuration] {
        &self.configs
    }

    /// The configuration used when none is named (`random_1k`).
    pub fn default_config(&self) -> &Configuration {
        self.configs
            .iter()
            .find(|config| config.name == DEFAULT_CONFIG_NAME)
            .unwrap_or(&self.configs[0])
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::build(&CatalogOptions::default())
    }
}

fn first_window(count: usize, window: FirstWindow) -> Vec<ShardId> {
    let skip = match window {
        FirstWindow::Leading => 0,
        FirstWindow::SkipFirst => 1,
    };
    ShardId::all().skip(skip).take(count).collect()
}

fn random_selection(rng: &mut StdRng, count: usize) -> Vec<ShardId> {
    let total = usize::from(SHARD_ID_MAX);
    index::sample(rng, total, count.min(total))
        .into_iter()
        .filter_map(|idx| ShardId::new(idx as i64 + 1).ok())
        .collect()
}
