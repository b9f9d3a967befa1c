//! Metadata loaders.
//!
//! - [`shard_json`] joins a shard's parameter sidecar with its extracted images.
//! - [`tabular`] reads the consolidated parquet table.
//!
//! Both hand out single-pass iterators that surface errors at the record that
//! triggered them.

mod coerce;
/// Per-shard sidecar + image loader.
pub mod shard_json;
/// Consolidated table loader.
pub mod tabular;

pub use shard_json::{ShardImages, ShardJsonLoader};
pub use tabular::{ConsolidatedTable, TableRows, TabularLoader};
