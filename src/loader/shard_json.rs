use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use super::coerce::{lenient_f32, lenient_i64};
use crate::data::{ExampleKey, ImageExample, ImagePayload, ParameterRecord, Sampler, ShardId};
use crate::errors::{DatasetError, Result};
use crate::fetch::ShardResource;
use crate::types::Prompt;

/// One sidecar entry, keyed by image filename in the enclosing object.
#[derive(Clone, Debug, Deserialize)]
struct SidecarEntry {
    #[serde(rename = "p")]
    prompt: Prompt,
    #[serde(rename = "se", deserialize_with = "lenient_i64")]
    seed: i64,
    #[serde(rename = "st", deserialize_with = "lenient_i64")]
    step: i64,
    #[serde(rename = "c", deserialize_with = "lenient_f32")]
    cfg: f32,
    #[serde(rename = "sa")]
    sampler: String,
}

impl SidecarEntry {
    fn into_parameters(self) -> ParameterRecord {
        ParameterRecord {
            prompt: self.prompt,
            seed: self.seed,
            step: self.step,
            cfg: self.cfg,
            sampler: Sampler::from_token(&self.sampler),
            part_id: None,
        }
    }
}

/// Loads a shard's sidecar and pairs each entry with its image file.
pub struct ShardJsonLoader;

impl ShardJsonLoader {
    /// Parse the sidecar of a fetched shard.
    ///
    /// Images are not touched here; each one is read when the returned
    /// iterator reaches it.
    pub fn open(shard: &ShardResource) -> Result<ShardImages> {
        let (Some(dir), Some(sidecar)) = (&shard.extracted_dir, &shard.sidecar_path) else {
            return Err(DatasetError::unavailable(
                &shard.resource,
                format!("shard {} has not been fetched", shard.shard_id),
            ));
        };
        Self::open_paths(shard.shard_id, dir, sidecar)
    }

    /// Parse a sidecar at an explicit path against an image directory.
    pub fn open_paths(shard_id: ShardId, dir: &Path, sidecar: &Path) -> Result<ShardImages> {
        let raw = fs::read(sidecar).map_err(|err| {
            DatasetError::corrupt(sidecar, format!("failed reading sidecar: {err}"))
        })?;
        let entries: IndexMap<String, SidecarEntry> = serde_json::from_slice(&raw)
            .map_err(|err| DatasetError::corrupt(sidecar, format!("unexpected sidecar shape: {err}")))?;
        debug!(
            "[diffusiondb:loader] shard {} sidecar lists {} images",
            shard_id,
            entries.len()
        );
        Ok(ShardImages {
            shard_id,
            dir: dir.to_path_buf(),
            sidecar: sidecar.to_path_buf(),
            total: entries.len(),
            position: 0,
            entries: entries.into_iter(),
        })
    }
}

/// Lazy iterator over one shard's images in sidecar order.
pub struct ShardImages {
    shard_id: ShardId,
    dir: PathBuf,
    sidecar: PathBuf,
    total: usize,
    position: usize,
    entries: indexmap::map::IntoIter<String, SidecarEntry>,
}

impl ShardImages {
    /// Shard being enumerated.
    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    /// Number of sidecar entries already consumed.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of entries listed in the sidecar.
    pub fn total(&self) -> usize {
        self.total
    }

    fn image_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let contained = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !contained {
            return Err(DatasetError::corrupt(
                &self.sidecar,
                format!("image name '{name}' escapes the shard directory"),
            ));
        }
        Ok(self.dir.join(relative))
    }

    fn load(&self, name: String, entry: SidecarEntry) -> Result<(ExampleKey, ImageExample)> {
        let path = self.image_path(&name)?;
        let bytes = fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => DatasetError::MissingAsset { path: path.clone() },
            _ => DatasetError::Io(err),
        })?;
        let image = ImagePayload { path, bytes };
        Ok((name, ImageExample::from_parameters(image, entry.into_parameters())))
    }
}

impl Iterator for ShardImages {
    type Item = Result<(ExampleKey, ImageExample)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (name, entry) = self.entries.next()?;
        self.position += 1;
        Some(self.load(name, entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for ShardImages {}
