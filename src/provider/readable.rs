//! Remote file reader
//!
//! Every read is exactly one ranged GET. The object size is fixed when the
//! handle is created; objects backing database files never change once
//! written, so it is never re-queried.

use std::io;
use std::sync::Arc;

use bytes::Bytes;

use crate::client::{ByteRange, ObjectClient};
use crate::error::{CloudError, Result};
use crate::filename::{encode_varint64, sst_file_number};

/// Random-access and sequential reader over one remote object
pub struct CloudReadableFile {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    path: String,
    /// Cursor for sequential reads
    offset: u64,
    file_size: u64,
}

impl CloudReadableFile {
    pub(crate) fn new(client: Arc<dyn ObjectClient>, bucket: &str, path: &str, file_size: u64) -> Self {
        tracing::debug!(bucket, path, file_size, "opened readable file");
        Self {
            client,
            bucket: bucket.to_string(),
            path: path.to_string(),
            offset: 0,
            file_size,
        }
    }

    /// Read up to `n` bytes at `offset`.
    ///
    /// Reads at or past the end return no bytes; reads crossing the end are
    /// trimmed. A zero-length request is sent as a one byte range and the
    /// result discarded, since object store ranges cannot be empty.
    pub fn read_at(&self, offset: u64, n: usize) -> Result<Bytes> {
        if offset >= self.file_size {
            return Ok(Bytes::new());
        }
        let n = (n as u64).min(self.file_size - offset) as usize;
        let range = ByteRange::with_len(offset, (n as u64).max(1));

        let out = self
            .client
            .get_object(&self.bucket, &self.path, Some(range))
            .map_err(|e| {
                let err = CloudError::from_client(&self.path, e);
                if err.is_not_found() {
                    tracing::debug!(bucket = %self.bucket, path = %self.path, %range, "object not found");
                } else {
                    tracing::error!(bucket = %self.bucket, path = %self.path, %range, error = %err, "ranged read failed");
                }
                err
            })?;

        let mut body = out.body;
        body.truncate(n);
        Ok(body)
    }

    /// Read up to `n` bytes at the cursor and advance it by what was returned.
    pub fn read(&mut self, n: usize) -> Result<Bytes> {
        let body = self.read_at(self.offset, n)?;
        self.offset += body.len() as u64;
        Ok(body)
    }

    /// Advance the cursor by `n` bytes, stopping at the end of the file.
    pub fn skip(&mut self, n: u64) {
        self.offset = self.offset.saturating_add(n).min(self.file_size);
    }

    pub fn size(&self) -> u64 {
        self.file_size
    }

    pub fn position(&self) -> u64 {
        self.offset
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cache key for table files: the varint-encoded file number.
    ///
    /// `None` for anything that is not a `.sst` file, and for file number 0.
    pub fn unique_id(&self) -> Option<Vec<u8>> {
        let name = self.path.rsplit('/').next()?;
        let number = sst_file_number(name).filter(|n| *n > 0)?;
        let mut id = Vec::with_capacity(10);
        encode_varint64(&mut id, number);
        Some(id)
    }
}

impl io::Read for CloudReadableFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let body = CloudReadableFile::read(self, buf.len())?;
        buf[..body.len()].copy_from_slice(&body);
        Ok(body.len())
    }
}

impl std::fmt::Debug for CloudReadableFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudReadableFile")
            .field("bucket", &self.bucket)
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("file_size", &self.file_size)
            .finish()
    }
}
