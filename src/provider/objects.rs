//! Whole-object transfer, copy and delete
//!
//! ## Download Consistency
//! A download lands in `<dest>.tmp` first. The size the store reported is
//! compared with the size that actually reached the disk; only an exact
//! match is renamed into place. On any failure the staging file is removed.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use bytes::Bytes;

use crate::client::{CopyRequest, Metadata, MultipartRequest, PutRequest};
use crate::error::{CloudError, Result};
use crate::paths::object_key;
use crate::transfer::{download_in_parts, upload_in_parts};

use super::{append_suffix, remove_quietly, StorageProvider};

/// Suffix of the local staging file used while downloading
pub const DOWNLOAD_TMP_SUFFIX: &str = ".tmp";

impl StorageProvider {
    /// Download `bucket/path` to `dest`, verifying the transferred size.
    pub fn get_object(&self, bucket: &str, path: &str, dest: &Path) -> Result<()> {
        let key = object_key(path);
        let tmp = append_suffix(dest, DOWNLOAD_TMP_SUFFIX);

        let remote_size = match self.download(bucket, key, &tmp) {
            Ok(size) => size,
            Err(e) => {
                tracing::error!(bucket, key, dest = %dest.display(), error = %e, "download failed");
                remove_quietly(&tmp);
                return Err(e);
            }
        };

        let local_size = match fs::metadata(&tmp) {
            Ok(meta) => meta.len(),
            Err(e) => {
                remove_quietly(&tmp);
                return Err(e.into());
            }
        };
        if local_size != remote_size {
            tracing::error!(
                bucket,
                key,
                local_size,
                remote_size,
                "downloaded size does not match object size"
            );
            remove_quietly(&tmp);
            return Err(CloudError::PartialDownload {
                path: dest.to_path_buf(),
                local_size,
                remote_size,
            });
        }

        if let Err(e) = fs::rename(&tmp, dest) {
            remove_quietly(&tmp);
            return Err(e.into());
        }
        tracing::debug!(bucket, key, size = remote_size, dest = %dest.display(), "downloaded object");
        Ok(())
    }

    /// Upload the local file `src` to `bucket/path`.
    ///
    /// Zero-size files are refused before any request is sent.
    pub fn put_object(&self, src: &Path, bucket: &str, path: &str) -> Result<()> {
        let key = object_key(path);
        let size = fs::metadata(src)?.len();
        if size == 0 {
            tracing::error!(src = %src.display(), bucket, key, "refusing to upload zero size file");
            return Err(CloudError::EmptyUpload(src.to_path_buf()));
        }

        let part_size = self.config.transfer_part_size;
        let result = match self.transfer_pool() {
            Some(pool) if size > part_size => {
                let request = MultipartRequest {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    metadata: Metadata::new(),
                    encryption: self.config.encryption.clone(),
                };
                upload_in_parts(&self.client, pool, src, request, size, part_size)
            }
            _ => {
                let body = Bytes::from(fs::read(src)?);
                let request = PutRequest {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    body,
                    metadata: Metadata::new(),
                    encryption: self.config.encryption.clone(),
                };
                self.client
                    .put_object(request)
                    .map_err(|e| CloudError::from_client(key, e))
            }
        };

        match &result {
            Ok(()) => tracing::debug!(src = %src.display(), bucket, key, size, "uploaded object"),
            Err(e) => tracing::error!(src = %src.display(), bucket, key, error = %e, "upload failed"),
        }
        result
    }

    pub fn delete_object(&self, bucket: &str, path: &str) -> Result<()> {
        let key = object_key(path);
        self.client.delete_object(bucket, key).map_err(|e| {
            tracing::warn!(bucket, key, error = %e, "delete failed");
            CloudError::from_client(key, e)
        })?;
        tracing::debug!(bucket, key, "deleted object");
        Ok(())
    }

    /// Server-side copy, keeping the source metadata
    pub fn copy_object(
        &self,
        src_bucket: &str,
        src_path: &str,
        dest_bucket: &str,
        dest_path: &str,
    ) -> Result<()> {
        let request = CopyRequest {
            src_bucket: src_bucket.to_string(),
            src_key: object_key(src_path).to_string(),
            dest_bucket: dest_bucket.to_string(),
            dest_key: object_key(dest_path).to_string(),
            metadata: None,
            encryption: self.config.encryption.clone(),
        };
        self.client.copy_object(&request).map_err(|e| {
            tracing::error!(
                src = %format!("{}/{}", src_bucket, request.src_key),
                dest = %format!("{}/{}", dest_bucket, request.dest_key),
                error = %e,
                "copy failed"
            );
            CloudError::from_client(&request.src_key, e)
        })?;
        tracing::debug!(src_bucket, src_key = %request.src_key, dest_bucket, dest_key = %request.dest_key, "copied object");
        Ok(())
    }

    /// Move the object into `tmp`, returning the size the store reported.
    fn download(&self, bucket: &str, key: &str, tmp: &Path) -> Result<u64> {
        if let Some(pool) = self.transfer_pool() {
            return download_in_parts(
                &self.client,
                pool,
                bucket,
                key,
                tmp,
                self.config.transfer_part_size,
            );
        }

        let out = self
            .client
            .get_object(bucket, key, None)
            .map_err(|e| CloudError::from_client(key, e))?;
        let mut file = File::create(tmp)?;
        file.write_all(&out.body)?;
        file.sync_all()?;
        Ok(out.content_length)
    }
}
