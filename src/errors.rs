use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ConfigName, ResourcePath};

/// Error type for catalog lookup, fetching, metadata parsing, and record assembly.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// No configuration with this name exists in the catalog.
    #[error("configuration '{name}' is not defined in the catalog")]
    ConfigurationNotFound {
        /// Requested name.
        name: ConfigName,
    },
    /// The fetcher could not produce a resource.
    #[error("resource '{resource}' is unavailable: {reason}")]
    ResourceUnavailable {
        /// Rendered resource identifier.
        resource: ResourcePath,
        /// Fetcher-provided reason.
        reason: String,
    },
    /// A sidecar or table could not be read or does not match its schema.
    #[error("corrupt metadata in {}: {details}", path.display())]
    CorruptMetadata {
        /// File that failed to parse.
        path: PathBuf,
        /// What was wrong with it.
        details: String,
    },
    /// An image listed in a sidecar is absent from the extracted shard.
    #[error("image asset {} listed in sidecar is missing on disk", path.display())]
    MissingAsset {
        /// Expected image location.
        path: PathBuf,
    },
    /// A consolidated-table sampler code outside `1..=9`.
    #[error("sampler code {0} is outside the known range 1..=9")]
    UnknownSamplerCode(i64),
    /// A shard id outside `1..=2000`.
    #[error("shard id {0} is outside the range 1..=2000")]
    InvalidShardId(i64),
    /// Invalid option values or combinations.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Filesystem failure while reading an extracted shard.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Crate-wide result alias.
pub type Result<T, E = DatasetError> = std::result::Result<T, E>;

impl DatasetError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::CorruptMetadata {
            path: path.into(),
            details: details.into(),
        }
    }

    pub(crate) fn unavailable(resource: impl ToString, reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            resource: resource.to_string(),
            reason: reason.into(),
        }
    }
}
