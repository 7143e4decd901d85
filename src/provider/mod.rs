//! Storage Provider Module
//!
//! The façade the database engine talks to. It owns the object store
//! client, translates every remote outcome into a [`CloudError`] and
//! manufactures remote file handles.
//!
//! ## Responsibilities
//! - Validate buckets and options at startup
//! - Simulate directories on top of the flat key namespace (listing)
//! - Whole-object get/put with size verification
//! - Object copy, delete, HEAD projections and metadata
//! - Create [`CloudReadableFile`] / [`CloudWritableFile`] handles
//!
//! ## Data Flow
//! ```text
//!   engine ──write──▶ CloudWritableFile ──(local staging file)
//!                            │ close / sync
//!                            ▼
//!                    StorageProvider::put_object ──▶ ObjectClient
//!
//!   engine ◀──read─── CloudReadableFile ◀── ranged GET ── ObjectClient
//! ```

mod listing;
mod objects;
mod readable;
mod writable;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::client::{
    ClientErrorKind, CopyRequest, HeadOutput, InMemoryClient, InstrumentedClient, LocalDirClient,
    Metadata, ObjectClient, RequestCallback,
};
use crate::config::{Config, ProviderKind};
use crate::error::{CloudError, Result};
use crate::paths::object_key;
use crate::transfer::TransferPool;

pub use listing::LIST_PAGE_SIZE;
pub use objects::DOWNLOAD_TMP_SUFFIX;
pub use readable::CloudReadableFile;
pub use writable::{CloudWritableFile, MANIFEST_TMP_SUFFIX};

/// Snapshot of one HEAD query
#[derive(Debug, Clone, Default)]
pub struct ObjectInfo {
    pub size: u64,
    /// Milliseconds since the unix epoch
    pub last_modified_ms: u64,
    pub metadata: Metadata,
}

impl From<HeadOutput> for ObjectInfo {
    fn from(head: HeadOutput) -> Self {
        Self {
            size: head.content_length,
            last_modified_ms: head.last_modified_ms,
            metadata: head.metadata,
        }
    }
}

/// Object store façade
///
/// ## Concurrency:
/// - Cheap to clone; clones share the client and transfer pool
/// - Every method takes `&self` and is safe to call concurrently for
///   different paths
#[derive(Clone)]
pub struct StorageProvider {
    config: Arc<Config>,
    client: Arc<dyn ObjectClient>,
    pool: Option<Arc<TransferPool>>,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageProvider")
            .field("client", &self.client.name())
            .field("config", &self.config)
            .field("transfer_pool", &self.pool.as_ref().map(|p| p.threads()))
            .finish()
    }
}

impl StorageProvider {
    /// Create a provider builder
    pub fn builder(config: Config) -> ProviderBuilder {
        ProviderBuilder::new(config)
    }

    /// Open a provider with the backend named in `config`
    pub fn open(config: Config) -> Result<Self> {
        ProviderBuilder::new(config).build()
    }

    /// Backend name ("memory", "local", ...)
    pub fn name(&self) -> &'static str {
        self.client.name()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The (possibly instrumented) client used for every request
    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    // =========================================================================
    // Buckets
    // =========================================================================

    /// Create `bucket` in the configured region.
    ///
    /// Succeeds when the bucket already exists or is already owned by us.
    pub fn create_bucket(&self, bucket: &str) -> Result<()> {
        match self.client.create_bucket(bucket, self.config.region()) {
            Ok(()) => {
                tracing::info!(bucket, provider = self.name(), "created bucket");
                Ok(())
            }
            Err(e)
                if matches!(
                    e.kind,
                    ClientErrorKind::BucketAlreadyExists | ClientErrorKind::BucketAlreadyOwnedByYou
                ) =>
            {
                tracing::debug!(bucket, "bucket already exists");
                Ok(())
            }
            Err(e) => {
                tracing::error!(bucket, error = %e, "failed to create bucket");
                Err(CloudError::Remote {
                    path: bucket.to_string(),
                    message: e.message,
                })
            }
        }
    }

    /// Lightweight existence probe; any failure is reported as not found.
    pub fn exists_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .head_bucket(bucket)
            .map_err(|e| CloudError::NotFound {
                path: bucket.to_string(),
                message: e.message,
            })
    }

    // =========================================================================
    // HEAD Projections
    // =========================================================================

    /// Size, modification time and metadata in a single round trip
    pub fn head_object(&self, bucket: &str, path: &str) -> Result<ObjectInfo> {
        let key = object_key(path);
        self.client
            .head_object(bucket, key)
            .map(ObjectInfo::from)
            .map_err(|e| CloudError::from_client(key, e))
    }

    pub fn exists_object(&self, bucket: &str, path: &str) -> Result<()> {
        self.head_object(bucket, path).map(|_| ())
    }

    pub fn get_object_size(&self, bucket: &str, path: &str) -> Result<u64> {
        self.head_object(bucket, path).map(|info| info.size)
    }

    /// Last modification time in milliseconds since the unix epoch
    pub fn get_object_modification_time(&self, bucket: &str, path: &str) -> Result<u64> {
        self.head_object(bucket, path).map(|info| info.last_modified_ms)
    }

    pub fn get_object_metadata(&self, bucket: &str, path: &str) -> Result<Metadata> {
        self.head_object(bucket, path).map(|info| info.metadata)
    }

    /// Replace an object's metadata, keeping its content.
    ///
    /// Issued as a single self-copy with replaced metadata.
    pub fn put_object_metadata(&self, bucket: &str, path: &str, metadata: &Metadata) -> Result<()> {
        let key = object_key(path);
        let request = CopyRequest {
            src_bucket: bucket.to_string(),
            src_key: key.to_string(),
            dest_bucket: bucket.to_string(),
            dest_key: key.to_string(),
            metadata: Some(metadata.clone()),
            encryption: self.config.encryption.clone(),
        };
        self.client.copy_object(&request).map_err(|e| {
            tracing::error!(bucket, key, error = %e, "error saving metadata");
            CloudError::from_client(key, e)
        })
    }

    // =========================================================================
    // File Handles
    // =========================================================================

    /// Open a reader bound to the object's current size.
    ///
    /// The size is resolved once here and never re-queried.
    pub fn new_cloud_readable_file(&self, bucket: &str, path: &str) -> Result<CloudReadableFile> {
        let size = self.get_object_size(bucket, path)?;
        Ok(CloudReadableFile::new(
            Arc::clone(&self.client),
            bucket,
            object_key(path),
            size,
        ))
    }

    /// Open a writer staging `local_path` for upload to `bucket/path`
    pub fn new_cloud_writable_file(
        &self,
        local_path: &Path,
        bucket: &str,
        path: &str,
    ) -> Result<CloudWritableFile> {
        CloudWritableFile::open(self.clone(), local_path, bucket, object_key(path))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Pool for chunked transfers, if enabled
    fn transfer_pool(&self) -> Option<&TransferPool> {
        if self.config.use_transfer_manager {
            self.pool.as_deref()
        } else {
            None
        }
    }

    /// Create or verify the destination bucket
    fn sanitize(&self) -> Result<()> {
        let Some(dest) = &self.config.dest_bucket else {
            return Ok(());
        };

        if self.exists_bucket(&dest.name).is_ok() {
            tracing::info!(bucket = %dest.name, "bucket already exists");
            return Ok(());
        }

        let result = if self.config.create_bucket_if_missing {
            tracing::info!(bucket = %dest.name, "going to create bucket");
            self.create_bucket(&dest.name)
        } else {
            Err(CloudError::NotFound {
                path: dest.name.clone(),
                message: "bucket not found and create_bucket_if_missing is false".to_string(),
            })
        };

        if let Err(e) = &result {
            tracing::error!(bucket = %dest.name, error = %e, "unable to create bucket");
        }
        result
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for StorageProvider
pub struct ProviderBuilder {
    config: Config,
    client: Option<Arc<dyn ObjectClient>>,
    pool: Option<Arc<TransferPool>>,
    callback: Option<RequestCallback>,
}

impl ProviderBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: None,
            pool: None,
            callback: None,
        }
    }

    /// Use this client instead of loading the one named in the config
    pub fn client(mut self, client: Arc<dyn ObjectClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Share a transfer pool (used when the transfer manager is enabled)
    pub fn transfer_pool(mut self, pool: Arc<TransferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Report every remote request to `callback`
    pub fn request_callback(mut self, callback: RequestCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Validate options, load the client and prepare the destination bucket
    pub fn build(self) -> Result<StorageProvider> {
        self.config.validate()?;

        let mut client = match self.client {
            Some(client) => client,
            None => load_client(&self.config)?,
        };
        if let Some(callback) = self.callback {
            client = Arc::new(InstrumentedClient::new(client, callback));
        }

        let pool = match self.pool {
            Some(pool) => Some(pool),
            None if self.config.use_transfer_manager => {
                Some(Arc::new(TransferPool::new(self.config.transfer_threads)?))
            }
            None => None,
        };

        tracing::info!(
            provider = client.name(),
            region = ?self.config.region(),
            transfer_manager = self.config.use_transfer_manager,
            "opening storage provider"
        );

        let provider = StorageProvider {
            config: Arc::new(self.config),
            client,
            pool,
        };
        provider.sanitize()?;
        Ok(provider)
    }
}

/// Instantiate the client variant selected by `config.provider`
pub fn load_client(config: &Config) -> Result<Arc<dyn ObjectClient>> {
    match config.provider {
        ProviderKind::Memory => Ok(Arc::new(InMemoryClient::new())),
        ProviderKind::Local => {
            let client = LocalDirClient::open(&config.local_root).map_err(|e| {
                CloudError::Config(format!(
                    "cannot open local store at {}: {}",
                    config.local_root.display(),
                    e.message
                ))
            })?;
            Ok(Arc::new(client))
        }
    }
}

// =============================================================================
// Local File Helpers
// =============================================================================

/// `path` with `suffix` appended to its file name
pub(crate) fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Best-effort removal of a staging file
pub(crate) fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove staging file"),
    }
}
