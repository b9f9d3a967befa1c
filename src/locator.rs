//! Pure mapping from shard ids to remote resource identifiers.

use std::fmt;

use crate::constants::locator::{
    ARCHIVE_EXTENSION, DEFAULT_NAMESPACE, IMAGES_DIR, METADATA_FILENAME, SIDECAR_EXTENSION,
};
use crate::data::ShardId;
use crate::types::{Namespace, ResourcePath};

/// Something the locator can address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShardTarget {
    /// One image shard archive.
    Shard(ShardId),
    /// The consolidated parameter table.
    Metadata,
}

/// Remote resource identifier: a namespace plus a path relative to it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId {
    namespace: Namespace,
    path: String,
}

impl ResourceId {
    /// Identifier for `path` under `namespace`.
    pub fn new(namespace: impl Into<Namespace>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// Namespace the path is relative to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Path relative to the namespace, e.g. `images/part-000001.zip`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this resource is a shard archive that must be extracted.
    pub fn is_archive(&self) -> bool {
        self.path
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
    }

    /// Final path segment without its extension (`part-000001`).
    pub fn stem(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }

    /// Render the Hub resolve URL for this resource.
    ///
    /// `https://huggingface.co/datasets/poloclub/diffusiondb/resolve/main/images/part-000001.zip`
    pub fn url(&self, endpoint: &str, revision: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            endpoint.trim_end_matches('/'),
            self.namespace,
            revision,
            self.path
        )
    }

    /// Rendered `<namespace>/<path>` form.
    pub fn to_path_string(&self) -> ResourcePath {
        self.to_string()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.path)
    }
}

/// Formats resource identifiers under a fixed namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardLocator {
    namespace: Namespace,
}

impl Default for ShardLocator {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl ShardLocator {
    /// Locator for `namespace`; trailing slashes are dropped.
    pub fn new(namespace: impl Into<Namespace>) -> Self {
        let namespace: Namespace = namespace.into();
        Self {
            namespace: namespace.trim_end_matches('/').to_string(),
        }
    }

    /// Namespace resources are formatted under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Archive resource for one shard: `<namespace>/images/part-{id:06}.zip`.
    pub fn locate(&self, shard_id: ShardId) -> ResourceId {
        ResourceId::new(
            self.namespace.clone(),
            format!(
                "{IMAGES_DIR}/{}.{ARCHIVE_EXTENSION}",
                Self::shard_stem(shard_id)
            ),
        )
    }

    /// Consolidated table resource: `<namespace>/metadata.parquet`.
    pub fn locate_metadata(&self) -> ResourceId {
        ResourceId::new(self.namespace.clone(), METADATA_FILENAME)
    }

    /// Resource for either kind of target.
    pub fn locate_target(&self, target: ShardTarget) -> ResourceId {
        match target {
            ShardTarget::Shard(id) => self.locate(id),
            ShardTarget::Metadata => self.locate_metadata(),
        }
    }

    /// Name of the parameter sidecar inside an extracted shard (`part-000001.json`).
    pub fn sidecar_filename(shard_id: ShardId) -> String {
        format!("{}.{SIDECAR_EXTENSION}", Self::shard_stem(shard_id))
    }

    fn shard_stem(shard_id: ShardId) -> String {
        format!("part-{}", shard_id.padded())
    }
}
