//! Error types for cloudstore
//!
//! Every remote outcome is translated into a [`CloudError`] at the provider
//! boundary. Callers only need to distinguish "not found" from everything
//! else; see [`CloudError::is_not_found`].

use std::path::PathBuf;

use thiserror::Error;

use crate::client::{ClientError, ClientErrorKind};

/// Result type alias using CloudError
pub type Result<T> = std::result::Result<T, CloudError>;

/// Marker some object stores embed in otherwise generic error bodies
const NOT_FOUND_MARKER: &str = "Response code: 404";

/// Unified error type for cloudstore operations
#[derive(Debug, Error)]
pub enum CloudError {
    // -------------------------------------------------------------------------
    // Local I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Remote Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {path}: {message}")]
    NotFound { path: String, message: String },

    #[error("Remote error: {path}: {message}")]
    Remote { path: String, message: String },

    #[error("Unexpected result from object store: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Transfer Errors
    // -------------------------------------------------------------------------
    #[error("Partial download of {path}: local size {local_size} != remote size {remote_size}")]
    PartialDownload {
        path: PathBuf,
        local_size: u64,
        remote_size: u64,
    },

    #[error("Refusing to upload zero size file {0}")]
    EmptyUpload(PathBuf),

    #[error("Failed to delete {failed} of {total} objects in bucket {bucket}")]
    BulkDelete {
        bucket: String,
        failed: usize,
        total: usize,
    },

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("File already closed: {0}")]
    Closed(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CloudError {
    /// Translate a client outcome for `path` into the provider taxonomy.
    pub(crate) fn from_client(path: &str, err: ClientError) -> Self {
        if is_not_found(&err) {
            CloudError::NotFound {
                path: path.to_string(),
                message: err.message,
            }
        } else {
            CloudError::Remote {
                path: path.to_string(),
                message: err.message,
            }
        }
    }

    /// True if the bucket, object or local file does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            CloudError::NotFound { .. } => true,
            CloudError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// True for the generic I/O failure class (everything that is neither
    /// not-found nor a configuration problem).
    pub fn is_io(&self) -> bool {
        !self.is_not_found()
            && !matches!(self, CloudError::Config(_) | CloudError::InvalidArgument(_))
    }
}

impl From<CloudError> for std::io::Error {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Io(e) => e,
            e if e.is_not_found() => std::io::Error::new(std::io::ErrorKind::NotFound, e),
            e => std::io::Error::new(std::io::ErrorKind::Other, e),
        }
    }
}

/// Whether a client error means the bucket or key is absent.
pub(crate) fn is_not_found(err: &ClientError) -> bool {
    matches!(
        err.kind,
        ClientErrorKind::NoSuchBucket | ClientErrorKind::NoSuchKey | ClientErrorKind::ResourceNotFound
    ) || err.message.contains(NOT_FOUND_MARKER)
}
