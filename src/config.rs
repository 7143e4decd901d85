//! Configuration for cloudstore
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CloudError, Result};

/// Main configuration for a storage provider
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Backend Selection
    // -------------------------------------------------------------------------
    /// Which object store client to load
    pub provider: ProviderKind,

    /// Root directory for the local-directory backend
    /// Internal structure:
    ///   {local_root}/
    ///     └── {bucket}/
    ///         ├── objects/   (object bytes, keyed by path)
    ///         ├── meta/      (sidecar records)
    ///         └── uploads/   (in-flight multipart parts)
    pub local_root: PathBuf,

    // -------------------------------------------------------------------------
    // Bucket Configuration
    // -------------------------------------------------------------------------
    /// Bucket files are read from
    pub src_bucket: Option<BucketOptions>,

    /// Bucket files are written to
    pub dest_bucket: Option<BucketOptions>,

    /// Create the destination bucket at startup if it does not exist
    pub create_bucket_if_missing: bool,

    // -------------------------------------------------------------------------
    // Writer Configuration
    // -------------------------------------------------------------------------
    /// Keep the local copy of table files after they were uploaded
    pub keep_local_sst_files: bool,

    /// Encryption applied to every upload path
    pub encryption: Encryption,

    // -------------------------------------------------------------------------
    // Transfer Configuration
    // -------------------------------------------------------------------------
    /// Move large objects in parts on the transfer pool
    pub use_transfer_manager: bool,

    /// Part size (bytes) for chunked transfers
    pub transfer_part_size: u64,

    /// Worker threads for the transfer pool
    pub transfer_threads: usize,
}

/// A bucket name plus the region it lives in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketOptions {
    pub name: String,
    pub region: String,
}

impl BucketOptions {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }
}

/// Server-side encryption mode for uploads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encryption {
    /// No encryption requested
    #[default]
    Disabled,

    /// Store-managed keys (AES256)
    ServerManaged,

    /// Customer-managed key, referenced by identifier
    CustomerKey(String),
}

/// Object store backends that can be selected by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Memory,
    Local,
}

impl FromStr for ProviderKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(ProviderKind::Memory),
            "local" => Ok(ProviderKind::Local),
            other => Err(CloudError::Config(format!(
                "unknown storage provider: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Memory => f.write_str("memory"),
            ProviderKind::Local => f.write_str("local"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Memory,
            local_root: PathBuf::from("./cloudstore_data"),
            src_bucket: None,
            dest_bucket: None,
            create_bucket_if_missing: true,
            keep_local_sst_files: false,
            encryption: Encryption::Disabled,
            use_transfer_manager: false,
            transfer_part_size: 8 * 1024 * 1024, // 8 MB
            transfer_threads: 8,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// True if source and destination name the same bucket
    pub fn src_matches_dest(&self) -> bool {
        match (&self.src_bucket, &self.dest_bucket) {
            (Some(src), Some(dest)) => src.name == dest.name,
            _ => false,
        }
    }

    /// Region used for bucket creation (destination first, then source)
    pub fn region(&self) -> Option<&str> {
        self.dest_bucket
            .as_ref()
            .or(self.src_bucket.as_ref())
            .map(|b| b.region.as_str())
    }

    /// Check option combinations that can never work.
    ///
    /// Buckets in two different regions are not supported.
    pub fn validate(&self) -> Result<()> {
        if let (Some(src), Some(dest)) = (&self.src_bucket, &self.dest_bucket) {
            if !self.src_matches_dest() && src.region != dest.region {
                tracing::error!(
                    src = %src.name,
                    dest = %dest.name,
                    src_region = %src.region,
                    dest_region = %dest.region,
                    "buckets in two different regions are not supported"
                );
                return Err(CloudError::Config(format!(
                    "two different regions not supported: {} ({}) and {} ({})",
                    src.name, src.region, dest.name, dest.region
                )));
            }
        }

        if self.use_transfer_manager {
            if self.transfer_part_size == 0 {
                return Err(CloudError::Config(
                    "transfer_part_size must be greater than zero".to_string(),
                ));
            }
            if self.transfer_threads == 0 {
                return Err(CloudError::Config(
                    "transfer_threads must be greater than zero".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Select the object store backend
    pub fn provider(mut self, kind: ProviderKind) -> Self {
        self.config.provider = kind;
        self
    }

    /// Set the root directory of the local-directory backend
    pub fn local_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.local_root = path.into();
        self
    }

    /// Set the source bucket
    pub fn src_bucket(mut self, name: impl Into<String>, region: impl Into<String>) -> Self {
        self.config.src_bucket = Some(BucketOptions::new(name, region));
        self
    }

    /// Set the destination bucket
    pub fn dest_bucket(mut self, name: impl Into<String>, region: impl Into<String>) -> Self {
        self.config.dest_bucket = Some(BucketOptions::new(name, region));
        self
    }

    pub fn create_bucket_if_missing(mut self, create: bool) -> Self {
        self.config.create_bucket_if_missing = create;
        self
    }

    /// Keep table files on local disk after upload
    pub fn keep_local_sst_files(mut self, keep: bool) -> Self {
        self.config.keep_local_sst_files = keep;
        self
    }

    /// Set the upload encryption mode
    pub fn encryption(mut self, encryption: Encryption) -> Self {
        self.config.encryption = encryption;
        self
    }

    /// Enable chunked transfers
    pub fn use_transfer_manager(mut self, enabled: bool) -> Self {
        self.config.use_transfer_manager = enabled;
        self
    }

    /// Set the chunk size for chunked transfers (in bytes)
    pub fn transfer_part_size(mut self, bytes: u64) -> Self {
        self.config.transfer_part_size = bytes;
        self
    }

    /// Set the number of transfer pool threads
    pub fn transfer_threads(mut self, threads: usize) -> Self {
        self.config.transfer_threads = threads;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
