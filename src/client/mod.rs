//! Object Store Client Module
//!
//! The narrow interface every object store backend implements. The provider
//! only ever talks to a store through [`ObjectClient`].
//!
//! ## Responsibilities
//! - Bucket create / existence probe
//! - Paginated listing in lexicographic key order
//! - Whole or ranged GET, HEAD, PUT, DELETE, COPY
//! - Multipart upload for chunked transfers
//!
//! ## Outcomes
//! - success
//! - not found: `NoSuchBucket`, `NoSuchKey`, `ResourceNotFound`
//! - any other failure, carrying the store's message

mod instrumented;
mod local;
mod memory;

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use thiserror::Error;

use crate::config::Encryption;

pub use instrumented::{InstrumentedClient, RequestCallback, RequestEvent, RequestOp};
pub use local::LocalDirClient;
pub use memory::{Fault, InMemoryClient, StoredObject};

/// Metadata attached to an object (sorted for stable output)
pub type Metadata = BTreeMap<String, String>;

/// Result type for raw client calls
pub type ClientResult<T> = std::result::Result<T, ClientError>;

// =============================================================================
// Errors
// =============================================================================

/// Failure class reported by an object store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    NoSuchBucket,
    NoSuchKey,
    ResourceNotFound,
    BucketAlreadyExists,
    BucketAlreadyOwnedByYou,
    Other,
}

/// Error returned by an object store client
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_such_key(key: &str) -> Self {
        Self::new(ClientErrorKind::NoSuchKey, format!("no such key: {}", key))
    }

    pub fn no_such_bucket(bucket: &str) -> Self {
        Self::new(
            ClientErrorKind::NoSuchBucket,
            format!("no such bucket: {}", bucket),
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Other, message)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::other(err.to_string())
    }
}

// =============================================================================
// Requests and Responses
// =============================================================================

/// Inclusive byte range `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Range of `len` bytes starting at `start`. `len` must be non-zero.
    pub fn with_len(start: u64, len: u64) -> Self {
        debug_assert!(len > 0, "object store ranges cannot be empty");
        Self {
            start,
            end: start + len - 1,
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes={}-{}", self.start, self.end)
    }
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    /// Return keys strictly after this one (empty = from the start)
    pub marker: String,
    pub max_keys: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Keys in lexicographic order
    pub keys: Vec<String>,
    pub is_truncated: bool,
    /// Some stores omit this even when the page is truncated
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetOutput {
    pub body: Bytes,
    /// Length the store claims for this response
    pub content_length: u64,
}

#[derive(Debug, Clone, Default)]
pub struct HeadOutput {
    pub content_length: u64,
    /// Milliseconds since the unix epoch
    pub last_modified_ms: u64,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct PutRequest {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub metadata: Metadata,
    pub encryption: Encryption,
}

#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub src_bucket: String,
    pub src_key: String,
    pub dest_bucket: String,
    pub dest_key: String,
    /// `Some` replaces the metadata, `None` copies it
    pub metadata: Option<Metadata>,
    pub encryption: Encryption,
}

#[derive(Debug, Clone)]
pub struct MultipartRequest {
    pub bucket: String,
    pub key: String,
    pub metadata: Metadata,
    pub encryption: Encryption,
}

// =============================================================================
// Client Trait
// =============================================================================

/// Capability set of an object store backend.
///
/// Implementations are blocking and must be safe to call from many threads.
/// Listings must return keys in lexicographic order: the provider relies on
/// it when a truncated page carries no `next_marker`.
pub trait ObjectClient: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    fn create_bucket(&self, bucket: &str, region: Option<&str>) -> ClientResult<()>;

    fn head_bucket(&self, bucket: &str) -> ClientResult<()>;

    fn list_objects(&self, request: &ListRequest) -> ClientResult<ListPage>;

    fn get_object(&self, bucket: &str, key: &str, range: Option<ByteRange>)
        -> ClientResult<GetOutput>;

    fn head_object(&self, bucket: &str, key: &str) -> ClientResult<HeadOutput>;

    fn put_object(&self, request: PutRequest) -> ClientResult<()>;

    fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()>;

    fn copy_object(&self, request: &CopyRequest) -> ClientResult<()>;

    /// Start a multipart upload, returning its id
    fn create_multipart_upload(&self, request: &MultipartRequest) -> ClientResult<String>;

    /// Upload one part (numbered from 1)
    fn upload_part(&self, upload_id: &str, part_number: u32, body: Bytes) -> ClientResult<()>;

    /// Assemble uploaded parts in part-number order into the object
    fn complete_multipart_upload(&self, upload_id: &str) -> ClientResult<()>;

    fn abort_multipart_upload(&self, upload_id: &str) -> ClientResult<()>;
}

/// Current wall-clock time in milliseconds since the unix epoch
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
