/// Constants describing the shard id space and the catalog layout.
pub mod registry {
    /// Smallest valid shard id.
    pub const SHARD_ID_MIN: u16 = 1;
    /// Largest valid shard id.
    pub const SHARD_ID_MAX: u16 = 2000;
    /// Number of images packed into each shard archive.
    pub const IMAGES_PER_SHARD: u64 = 1000;
    /// Name of the configuration that selects every shard.
    pub const ALL_CONFIG_NAME: &str = "all";
    /// Name of the configuration that reads the consolidated table only.
    pub const TEXT_ONLY_CONFIG_NAME: &str = "text_only";
    /// Configuration used when the caller does not name one.
    pub const DEFAULT_CONFIG_NAME: &str = "random_1k";
}

/// Constants used to build remote resource identifiers.
pub mod locator {
    /// Hub namespace of the dataset repository.
    pub const DEFAULT_NAMESPACE: &str = "datasets/poloclub/diffusiondb";
    /// Hub repository id (namespace without the `datasets/` prefix).
    pub const DEFAULT_REPO_ID: &str = "poloclub/diffusiondb";
    /// Default Hub endpoint used when rendering resolve URLs.
    pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
    /// Default repository revision.
    pub const DEFAULT_REVISION: &str = "main";
    /// Directory holding the shard archives inside the repository.
    pub const IMAGES_DIR: &str = "images";
    /// Filename of the consolidated parameter table.
    pub const METADATA_FILENAME: &str = "metadata.parquet";
    /// Extension of shard archives.
    pub const ARCHIVE_EXTENSION: &str = "zip";
    /// Extension of per-shard parameter sidecars.
    pub const SIDECAR_EXTENSION: &str = "json";
}

/// Constants used by fetchers and the local cache layout.
pub mod fetch {
    /// Default directory for downloaded and extracted resources.
    pub const DEFAULT_CACHE_DIR: &str = ".diffusiondb_cache";
    /// Subdirectory of the cache holding extracted shard archives.
    pub const EXTRACTED_DIR: &str = "extracted";
    /// Subdirectory of the cache holding raw downloads.
    pub const DOWNLOADS_DIR: &str = "downloads";
    /// Suffix used for in-flight downloads before they are renamed into place.
    pub const PARTIAL_SUFFIX: &str = "part";
    /// Suffix used for in-flight extraction directories.
    pub const EXTRACTING_SUFFIX: &str = "extracting";
    /// Number of download attempts the Hub client performs before giving up.
    pub const HUB_RETRIES: usize = 5;
    /// Read buffer size used when streaming HTTP downloads to disk.
    pub const DOWNLOAD_BUFFER_BYTES: usize = 1024 * 1024;
}

/// Environment variables consulted by `DatasetConfig::from_env`.
pub mod env {
    /// Seed for random-policy catalog construction.
    pub const SEED: &str = "DIFFUSIONDB_SEED";
    /// Cache directory override.
    pub const CACHE_DIR: &str = "DIFFUSIONDB_CACHE_DIR";
    /// Remote namespace override.
    pub const NAMESPACE: &str = "DIFFUSIONDB_NAMESPACE";
    /// `first_*` window mode (`leading` or `skip-first`).
    pub const FIRST_WINDOW: &str = "DIFFUSIONDB_FIRST_WINDOW";
}
