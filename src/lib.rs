#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Record assembly and streaming.
pub mod assembler;
/// Catalog, fetch, and environment configuration.
pub mod config;
/// Centralized constants for the shard id space, resource layout, and cache.
pub mod constants;
/// Shard ids, sampler tokens, and emitted record types.
pub mod data;
/// Reusable CLI runners shared by the demo binaries.
pub mod example_apps;
/// Content fetchers and archive extraction.
pub mod fetch;
/// Sidecar and consolidated table loaders.
pub mod loader;
/// Remote resource identifiers.
pub mod locator;
/// Named configurations and shard selection.
pub mod registry;
/// Emitted field layouts.
pub mod schema;
/// Shared type aliases.
pub mod types;

mod errors;

pub use assembler::{Assembler, ExampleStream, StreamState};
pub use config::{CatalogOptions, DatasetConfig, FetchConfig, FirstWindow};
pub use data::{
    Example, ExampleKind, ImageExample, ImagePayload, ParameterRecord, Sampler, ShardId,
    TextExample, translate,
};
pub use errors::{DatasetError, Result};
pub use fetch::{ContentFetcher, HttpFetcher, LocalFetcher, ShardResource};
#[cfg(feature = "huggingface")]
pub use fetch::HubFetcher;
pub use loader::{ShardJsonLoader, TabularLoader};
pub use locator::{ResourceId, ShardLocator, ShardTarget};
pub use registry::{Catalog, Configuration, SelectionPolicy, TargetSize};
pub use schema::{FieldSpec, FieldType, features};
pub use types::{ConfigName, ExampleKey, ImageName, Namespace, Prompt, ResourcePath};
