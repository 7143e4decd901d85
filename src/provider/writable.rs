//! Remote file writer
//!
//! Writes always land in a local file first; the remote object is produced
//! from it.
//!
//! ## Table files
//! `close` flushes, uploads the whole file and deletes the local copy
//! (unless `keep_local_sst_files`). A failed upload leaves the local file in
//! place and the writer refuses any further use.
//!
//! ## Manifest
//! ```text
//!   open(MANIFEST exists) ──▶ writes go to MANIFEST.inprogress
//!   first sync            ──▶ fsync, rename MANIFEST.inprogress → MANIFEST
//!   every sync            ──▶ upload MANIFEST (best effort)
//!   close                 ──▶ flush only; no upload, local copy kept
//! ```
//! The rename assumes a single writer thread per manifest.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{CloudError, Result};
use crate::filename::FileRole;

use super::{append_suffix, remove_quietly, StorageProvider};

/// Suffix of the side file receiving an in-progress manifest rewrite
pub const MANIFEST_TMP_SUFFIX: &str = ".inprogress";

/// Writer for one table file or manifest
pub struct CloudWritableFile {
    provider: StorageProvider,
    local_path: PathBuf,
    bucket: String,
    object_path: String,
    role: FileRole,
    file: Option<BufWriter<File>>,
    /// Side file holding manifest writes until the first sync
    tmp_path: Option<PathBuf>,
    remote_synced: bool,
    /// Set once an upload failed; the writer is unusable afterwards
    failure: Option<String>,
}

impl CloudWritableFile {
    pub(crate) fn open(
        provider: StorageProvider,
        local_path: &Path,
        bucket: &str,
        object_path: &str,
    ) -> Result<Self> {
        let role = FileRole::from_path(local_path).ok_or_else(|| {
            CloudError::InvalidArgument(format!(
                "{} is neither a table file nor a manifest",
                local_path.display()
            ))
        })?;

        let tmp_path = if role == FileRole::Manifest && local_path.exists() {
            Some(append_suffix(local_path, MANIFEST_TMP_SUFFIX))
        } else {
            None
        };
        let target = tmp_path.as_deref().unwrap_or(local_path);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(target)
            .map_err(|e| {
                tracing::error!(path = %target.display(), error = %e, "unable to open local file");
                e
            })?;

        tracing::debug!(
            local = %local_path.display(),
            bucket,
            object = object_path,
            ?role,
            side_file = tmp_path.is_some(),
            "opened writable file"
        );

        Ok(Self {
            provider,
            local_path: local_path.to_path_buf(),
            bucket: bucket.to_string(),
            object_path: object_path.to_string(),
            role,
            file: Some(BufWriter::new(file)),
            tmp_path,
            remote_synced: false,
            failure: None,
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file_mut()?.write_all(data)?;
        Ok(())
    }

    /// Push buffered bytes to the local file (no fsync)
    pub fn flush(&mut self) -> Result<()> {
        self.file_mut()?.flush()?;
        Ok(())
    }

    /// Make written bytes durable locally.
    ///
    /// For the manifest this also makes a pending side file live (first sync
    /// only) and re-uploads the whole manifest. Upload failures are logged
    /// and reflected in [`remote_synced`](Self::remote_synced) but do not
    /// fail the sync.
    pub fn sync(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.flush()?;
        file.get_ref().sync_all()?;

        if self.role != FileRole::Manifest {
            return Ok(());
        }

        if let Some(tmp) = self.tmp_path.take() {
            if let Err(e) = fs::rename(&tmp, &self.local_path) {
                tracing::error!(
                    from = %tmp.display(),
                    to = %self.local_path.display(),
                    error = %e,
                    "unable to install manifest"
                );
                self.tmp_path = Some(tmp);
                return Err(e.into());
            }
            tracing::debug!(path = %self.local_path.display(), "installed new manifest");
        }

        match self
            .provider
            .put_object(&self.local_path, &self.bucket, &self.object_path)
        {
            Ok(()) => self.remote_synced = true,
            Err(e) => {
                tracing::error!(
                    bucket = %self.bucket,
                    object = %self.object_path,
                    error = %e,
                    "manifest upload failed"
                );
                self.remote_synced = false;
            }
        }
        Ok(())
    }

    /// Finish the file.
    ///
    /// Table files are uploaded and the local copy removed; the manifest is
    /// only flushed. Closing twice is a no-op unless an upload failed.
    pub fn close(&mut self) -> Result<()> {
        if let Some(reason) = &self.failure {
            return Err(CloudError::Closed(reason.clone()));
        }
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        let flushed = file.flush().and_then(|_| file.get_ref().sync_all());
        drop(file);

        match self.role {
            FileRole::Manifest => {
                if let Some(tmp) = self.tmp_path.take() {
                    tracing::debug!(path = %tmp.display(), "discarding unsynced manifest side file");
                    remove_quietly(&tmp);
                }
                flushed?;
                Ok(())
            }
            FileRole::Table => {
                if let Err(e) = flushed {
                    self.failure = Some(e.to_string());
                    return Err(e.into());
                }
                self.upload_table()
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_manifest(&self) -> bool {
        self.role == FileRole::Manifest
    }

    /// Whether the last manifest sync reached the object store
    pub fn remote_synced(&self) -> bool {
        self.remote_synced
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn file_mut(&mut self) -> Result<&mut BufWriter<File>> {
        if let Some(reason) = &self.failure {
            return Err(CloudError::Closed(reason.clone()));
        }
        let path = &self.local_path;
        self.file
            .as_mut()
            .ok_or_else(|| CloudError::Closed(path.display().to_string()))
    }

    fn upload_table(&mut self) -> Result<()> {
        if let Err(e) = self
            .provider
            .put_object(&self.local_path, &self.bucket, &self.object_path)
        {
            tracing::error!(
                local = %self.local_path.display(),
                bucket = %self.bucket,
                object = %self.object_path,
                error = %e,
                "table upload failed, keeping local file"
            );
            self.failure = Some(format!("upload of {} failed: {}", self.local_path.display(), e));
            return Err(e);
        }

        if self.provider.config().keep_local_sst_files {
            tracing::debug!(path = %self.local_path.display(), "uploaded table, keeping local copy");
            return Ok(());
        }
        fs::remove_file(&self.local_path)?;
        tracing::debug!(path = %self.local_path.display(), "uploaded table, removed local copy");
        Ok(())
    }
}

impl io::Write for CloudWritableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        CloudWritableFile::flush(self).map_err(io::Error::from)
    }
}

impl std::fmt::Debug for CloudWritableFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudWritableFile")
            .field("local_path", &self.local_path)
            .field("bucket", &self.bucket)
            .field("object_path", &self.object_path)
            .field("role", &self.role)
            .field("remote_synced", &self.remote_synced)
            .finish()
    }
}

impl Drop for CloudWritableFile {
    fn drop(&mut self) {
        if self.file.is_none() {
            return;
        }
        if let Err(e) = self.close() {
            tracing::error!(path = %self.local_path.display(), error = %e, "close on drop failed");
        }
    }
}
