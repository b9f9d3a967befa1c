//! Record assembly: turns a configuration name into a lazy stream of examples.

use std::iter::FusedIterator;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::DatasetConfig;
use crate::data::{Example, ExampleKey, ExampleKind, ShardId};
use crate::errors::{DatasetError, Result};
use crate::fetch::{ContentFetcher, ShardResource};
use crate::loader::{ShardImages, ShardJsonLoader, TableRows, TabularLoader};
use crate::locator::{ResourceId, ShardLocator};
use crate::registry::{Catalog, Configuration};
use crate::schema::{self, FieldSpec};
use crate::types::ConfigName;

/// Entry point for streaming examples out of a catalog.
///
/// The assembler itself is immutable and cheap to clone; each call to
/// [`Assembler::stream`] returns an independent [`ExampleStream`].
#[derive(Clone)]
pub struct Assembler {
    catalog: Arc<Catalog>,
    locator: ShardLocator,
    fetcher: Arc<dyn ContentFetcher>,
}

impl Assembler {
    /// Assemble from an existing catalog, locator, and fetcher.
    pub fn new(catalog: Arc<Catalog>, locator: ShardLocator, fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self {
            catalog,
            locator,
            fetcher,
        }
    }

    /// Build the catalog and locator described by `config`.
    pub fn from_config(config: &DatasetConfig, fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self::new(
            Arc::new(Catalog::build(&config.catalog)),
            ShardLocator::new(config.namespace.clone()),
            fetcher,
        )
    }

    /// Catalog the assembler resolves names against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Locator used to name remote resources.
    pub fn locator(&self) -> &ShardLocator {
        &self.locator
    }

    /// Open a stream over the named configuration.
    ///
    /// Nothing is fetched until the first item is pulled.
    pub fn stream(&self, name: &str) -> Result<ExampleStream> {
        let config = self.catalog.get(name)?;
        Ok(self.stream_for(config))
    }

    /// Open a stream over the catalog's default configuration.
    pub fn stream_default(&self) -> ExampleStream {
        self.stream_for(self.catalog.default_config())
    }

    /// Remote resources a configuration reads, in iteration order.
    pub fn resources(&self, name: &str) -> Result<Vec<ResourceId>> {
        let config = self.catalog.get(name)?;
        Ok(match config.kind() {
            ExampleKind::Text => vec![self.locator.locate_metadata()],
            ExampleKind::Image => config
                .shard_ids()
                .iter()
                .map(|shard_id| self.locator.locate(*shard_id))
                .collect(),
        })
    }

    /// Ask the fetcher to warm every resource of a configuration up front.
    pub fn prefetch(&self, name: &str) -> Result<()> {
        let resources = self.resources(name)?;
        info!(
            "[diffusiondb:assembler] prefetching {} resources for '{}'",
            resources.len(),
            name
        );
        self.fetcher.prefetch(&resources)
    }

    /// Fields emitted by the named configuration.
    pub fn features(&self, name: &str) -> Result<&'static [FieldSpec]> {
        self.catalog
            .get(name)
            .map(|config| schema::features(config.kind()))
    }

    fn stream_for(&self, config: &Configuration) -> ExampleStream {
        debug!(
            "[diffusiondb:assembler] opening stream for '{}' ({} shards)",
            config.name(),
            config.shard_ids().len()
        );
        ExampleStream {
            config: config.name().to_string(),
            kind: config.kind(),
            locator: self.locator.clone(),
            fetcher: Arc::clone(&self.fetcher),
            pending: config.shard_ids().to_vec().into_iter(),
            phase: Phase::NotStarted,
            emitted: 0,
        }
    }
}

/// Snapshot of where a stream currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing has been pulled yet.
    NotStarted,
    /// Enumerating a shard; `position` entries of its sidecar are consumed.
    InShard {
        /// Shard being enumerated.
        shard_id: ShardId,
        /// Sidecar entries consumed.
        position: usize,
    },
    /// Reading the consolidated table; `position` rows are consumed.
    InTable {
        /// Rows consumed.
        position: usize,
    },
    /// Finished, either normally or after an error.
    Exhausted,
}

enum Phase {
    NotStarted,
    Shard(ShardImages),
    Table(TableRows),
    Exhausted,
}

/// Lazy, single-pass stream of `(key, example)` pairs.
///
/// Shards are fetched one at a time as the previous one runs out. The first
/// error ends the stream; every later call to `next` returns `None`.
pub struct ExampleStream {
    config: ConfigName,
    kind: ExampleKind,
    locator: ShardLocator,
    fetcher: Arc<dyn ContentFetcher>,
    pending: std::vec::IntoIter<ShardId>,
    phase: Phase,
    emitted: usize,
}

impl ExampleStream {
    /// Configuration the stream was opened for.
    pub fn config_name(&self) -> &str {
        &self.config
    }

    /// Record shape the stream emits.
    pub fn kind(&self) -> ExampleKind {
        self.kind
    }

    /// Number of examples yielded so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Current position of the stream.
    pub fn state(&self) -> StreamState {
        match &self.phase {
            Phase::NotStarted => StreamState::NotStarted,
            Phase::Shard(images) => StreamState::InShard {
                shard_id: images.shard_id(),
                position: images.position(),
            },
            Phase::Table(rows) => StreamState::InTable {
                position: rows.position(),
            },
            Phase::Exhausted => StreamState::Exhausted,
        }
    }

    fn open_table(&self) -> Result<Phase> {
        let resource = self.locator.locate_metadata();
        let path = self.fetcher.download(&resource)?;
        let table = TabularLoader::load(&path)?;
        Ok(Phase::Table(table.into_rows()))
    }

    fn open_next_shard(&mut self) -> Result<Phase> {
        let Some(shard_id) = self.pending.next() else {
            return Ok(Phase::Exhausted);
        };
        let shard = ShardResource::located(&self.locator, shard_id).fetch(self.fetcher.as_ref())?;
        let images = ShardJsonLoader::open(&shard)?;
        debug!(
            "[diffusiondb:assembler] '{}' entering shard {} ({} images, {} shards left)",
            self.config,
            shard_id,
            images.total(),
            self.pending.len()
        );
        Ok(Phase::Shard(images))
    }

    fn fail(&mut self, err: DatasetError) -> DatasetError {
        warn!(
            "[diffusiondb:assembler] '{}' stopped after {} examples: {}",
            self.config, self.emitted, err
        );
        self.phase = Phase::Exhausted;
        err
    }

    fn finish(&mut self) {
        info!(
            "[diffusiondb:assembler] '{}' exhausted after {} examples",
            self.config, self.emitted
        );
        self.phase = Phase::Exhausted;
    }

    fn advance(&mut self) -> Option<Result<(ExampleKey, Example)>> {
        loop {
            let opened = match &mut self.phase {
                Phase::Exhausted => return None,
                Phase::NotStarted => match self.kind {
                    ExampleKind::Text => self.open_table(),
                    ExampleKind::Image => self.open_next_shard(),
                },
                Phase::Shard(images) => match images.next() {
                    Some(Ok((key, example))) => return Some(Ok((key, Example::Image(example)))),
                    Some(Err(err)) => return Some(Err(self.fail(err))),
                    None => self.open_next_shard(),
                },
                Phase::Table(rows) => match rows.next() {
                    Some(Ok((key, example))) => return Some(Ok((key, Example::Text(example)))),
                    Some(Err(err)) => return Some(Err(self.fail(err))),
                    None => Ok(Phase::Exhausted),
                },
            };
            match opened {
                Ok(Phase::Exhausted) => self.finish(),
                Ok(phase) => self.phase = phase,
                Err(err) => return Some(Err(self.fail(err))),
            }
        }
    }
}

impl Iterator for ExampleStream {
    type Item = Result<(ExampleKey, Example)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.advance()?;
        if item.is_ok() {
            self.emitted += 1;
        }
        Some(item)
    }
}

impl FusedIterator for ExampleStream {}
