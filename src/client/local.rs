//! Local directory object store
//!
//! Emulates an object store on a local filesystem so a database can run
//! against the provider without a network.
//!
//! ## Layout
//! ```text
//! {root}/
//!   └── {bucket}/
//!       ├── objects/{key}        object bytes ('/' in keys become dirs)
//!       ├── meta/{key}.meta      bincode ObjectRecord sidecar
//!       └── uploads/             staging for puts and multipart parts
//! ```
//!
//! Object writes are staged under `uploads/` and renamed into place, so a
//! reader never sees a partially written object.
//!
//! ## Commit point
//! An object and its sidecar change together. Both are staged first, then
//! renamed into place while holding the store's commit lock for writing.
//! Whole-object reads hold it for reading across the byte read and the
//! checksum check, so they always see a matching pair.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::Encryption;

use super::{
    now_millis, ByteRange, ClientError, ClientErrorKind, ClientResult, CopyRequest, GetOutput,
    HeadOutput, ListPage, ListRequest, Metadata, MultipartRequest, ObjectClient, PutRequest,
};

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";
const UPLOADS_DIR: &str = "uploads";
const META_SUFFIX: &str = ".meta";

/// Sidecar record stored next to every object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ObjectRecord {
    metadata: Metadata,
    last_modified_ms: u64,
    /// CRC32 of the object bytes
    crc32: u32,
    encryption: Encryption,
}

#[derive(Debug)]
struct LocalUpload {
    bucket: String,
    key: String,
    metadata: Metadata,
    encryption: Encryption,
    dir: PathBuf,
}

/// Filesystem-backed [`ObjectClient`]
pub struct LocalDirClient {
    root: PathBuf,
    uploads: Mutex<HashMap<String, LocalUpload>>,
    next_id: AtomicU64,
    /// Held for writing while an object and its sidecar are swapped in
    commit_lock: RwLock<()>,
}

impl std::fmt::Debug for LocalDirClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDirClient")
            .field("root", &self.root)
            .field("pending_uploads", &self.uploads.lock().len())
            .finish()
    }
}

impl LocalDirClient {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: &Path) -> ClientResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            uploads: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            commit_lock: RwLock::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn existing_bucket_dir(&self, bucket: &str) -> ClientResult<PathBuf> {
        let dir = self.bucket_dir(bucket);
        if dir.join(OBJECTS_DIR).is_dir() {
            Ok(dir)
        } else {
            Err(ClientError::no_such_bucket(bucket))
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> ClientResult<PathBuf> {
        validate_key(key)?;
        Ok(self.existing_bucket_dir(bucket)?.join(OBJECTS_DIR).join(key))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> ClientResult<PathBuf> {
        validate_key(key)?;
        Ok(self
            .existing_bucket_dir(bucket)?
            .join(META_DIR)
            .join(format!("{}{}", key, META_SUFFIX)))
    }

    fn staging_path(&self, bucket: &str) -> ClientResult<PathBuf> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .existing_bucket_dir(bucket)?
            .join(UPLOADS_DIR)
            .join(format!("put-{:08}", id)))
    }

    fn read_record(&self, bucket: &str, key: &str) -> ClientResult<Option<ObjectRecord>> {
        let path = self.meta_path(bucket, key)?;
        match fs::read(&path) {
            Ok(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| ClientError::other(format!("corrupt sidecar {}: {}", key, e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `record` to a staging file and return its path
    fn stage_record(&self, bucket: &str, key: &str, record: &ObjectRecord) -> ClientResult<PathBuf> {
        let bytes = bincode::serialize(record)
            .map_err(|e| ClientError::other(format!("encode sidecar {}: {}", key, e)))?;
        let staging = self.staging_path(bucket)?;
        fs::write(&staging, bytes)?;
        Ok(staging)
    }

    /// Move a fully written staging file into place as `key`.
    ///
    /// The sidecar is staged before anything becomes visible; both renames
    /// happen under the commit lock.
    fn commit(
        &self,
        bucket: &str,
        key: &str,
        staging: &Path,
        metadata: Metadata,
        encryption: Encryption,
    ) -> ClientResult<()> {
        let path = self.object_path(bucket, key)?;
        let meta_path = self.meta_path(bucket, key)?;
        let record = ObjectRecord {
            metadata,
            last_modified_ms: now_millis(),
            crc32: file_crc32(staging)?,
            encryption,
        };
        let record_staging = match self.stage_record(bucket, key, &record) {
            Ok(p) => p,
            Err(e) => {
                let _ = fs::remove_file(staging);
                return Err(e);
            }
        };

        let _guard = self.commit_lock.write();
        if let Err(e) = rename_into(&record_staging, &meta_path) {
            let _ = fs::remove_file(&record_staging);
            let _ = fs::remove_file(staging);
            return Err(e);
        }
        rename_into(staging, &path)
    }
}

impl ObjectClient for LocalDirClient {
    fn name(&self) -> &'static str {
        "local"
    }

    fn create_bucket(&self, bucket: &str, _region: Option<&str>) -> ClientResult<()> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            return Err(ClientError::other(format!("invalid bucket name: {:?}", bucket)));
        }
        let dir = self.bucket_dir(bucket);
        if dir.join(OBJECTS_DIR).is_dir() {
            return Err(ClientError::new(
                ClientErrorKind::BucketAlreadyOwnedByYou,
                format!("bucket {} already exists", bucket),
            ));
        }
        for sub in [OBJECTS_DIR, META_DIR, UPLOADS_DIR] {
            fs::create_dir_all(dir.join(sub))?;
        }
        Ok(())
    }

    fn head_bucket(&self, bucket: &str) -> ClientResult<()> {
        self.existing_bucket_dir(bucket).map(|_| ())
    }

    fn list_objects(&self, request: &ListRequest) -> ClientResult<ListPage> {
        let objects = self.existing_bucket_dir(&request.bucket)?.join(OBJECTS_DIR);

        let mut all = Vec::new();
        collect_keys(&objects, String::new(), &mut all)?;
        all.sort();

        let mut keys: Vec<String> = all
            .into_iter()
            .filter(|k| k.as_str() > request.marker.as_str() && k.starts_with(&request.prefix))
            .take(request.max_keys + 1)
            .collect();
        let is_truncated = keys.len() > request.max_keys;
        keys.truncate(request.max_keys);

        // Like many S3-compatible stores, never report an explicit marker
        Ok(ListPage {
            keys,
            is_truncated,
            next_marker: None,
        })
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ClientResult<GetOutput> {
        let path = self.object_path(bucket, key)?;
        // Whole reads verify bytes against the sidecar, so they must not
        // straddle a commit
        let _guard = range.is_none().then(|| self.commit_lock.read());
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClientError::no_such_key(key))
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata()?.len();

        match range {
            None => {
                let mut data = Vec::with_capacity(size as usize);
                file.read_to_end(&mut data)?;
                if let Some(record) = self.read_record(bucket, key)? {
                    if crc32fast::hash(&data) != record.crc32 {
                        return Err(ClientError::other(format!(
                            "checksum mismatch for {}/{}",
                            bucket, key
                        )));
                    }
                }
                Ok(GetOutput {
                    content_length: data.len() as u64,
                    body: Bytes::from(data),
                })
            }
            Some(r) => {
                if r.start >= size {
                    return Err(ClientError::other(format!(
                        "invalid range {} for object of size {}",
                        r, size
                    )));
                }
                let len = (r.end.min(size - 1) - r.start + 1) as usize;
                file.seek(SeekFrom::Start(r.start))?;
                let mut data = vec![0u8; len];
                file.read_exact(&mut data)?;
                Ok(GetOutput {
                    content_length: len as u64,
                    body: Bytes::from(data),
                })
            }
        }
    }

    fn head_object(&self, bucket: &str, key: &str) -> ClientResult<HeadOutput> {
        let path = self.object_path(bucket, key)?;
        let _guard = self.commit_lock.read();
        let meta = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(ClientError::no_such_key(key)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClientError::no_such_key(key))
            }
            Err(e) => return Err(e.into()),
        };
        let record = self.read_record(bucket, key)?.unwrap_or_default();
        Ok(HeadOutput {
            content_length: meta.len(),
            last_modified_ms: record.last_modified_ms,
            metadata: record.metadata,
        })
    }

    fn put_object(&self, request: PutRequest) -> ClientResult<()> {
        validate_key(&request.key)?;
        let staging = self.staging_path(&request.bucket)?;
        fs::write(&staging, &request.body)?;
        self.commit(
            &request.bucket,
            &request.key,
            &staging,
            request.metadata,
            request.encryption,
        )
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        let path = self.object_path(bucket, key)?;
        let meta = self.meta_path(bucket, key)?;
        let _guard = self.commit_lock.write();
        for p in [path, meta] {
            match fs::remove_file(&p) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn copy_object(&self, request: &CopyRequest) -> ClientResult<()> {
        let src = self.object_path(&request.src_bucket, &request.src_key)?;
        let staging = self.staging_path(&request.dest_bucket)?;
        let metadata = {
            let _guard = self.commit_lock.read();
            if !src.is_file() {
                return Err(ClientError::no_such_key(&request.src_key));
            }
            fs::copy(&src, &staging)?;
            match &request.metadata {
                Some(m) => m.clone(),
                None => self
                    .read_record(&request.src_bucket, &request.src_key)?
                    .unwrap_or_default()
                    .metadata,
            }
        };

        self.commit(
            &request.dest_bucket,
            &request.dest_key,
            &staging,
            metadata,
            request.encryption.clone(),
        )
    }

    fn create_multipart_upload(&self, request: &MultipartRequest) -> ClientResult<String> {
        validate_key(&request.key)?;
        let bucket_dir = self.existing_bucket_dir(&request.bucket)?;
        let id = format!(
            "local-upload-{}-{}",
            now_millis(),
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        let dir = bucket_dir.join(UPLOADS_DIR).join(&id);
        fs::create_dir_all(&dir)?;

        self.uploads.lock().insert(
            id.clone(),
            LocalUpload {
                bucket: request.bucket.clone(),
                key: request.key.clone(),
                metadata: request.metadata.clone(),
                encryption: request.encryption.clone(),
                dir,
            },
        );
        Ok(id)
    }

    fn upload_part(&self, upload_id: &str, part_number: u32, body: Bytes) -> ClientResult<()> {
        let dir = self
            .uploads
            .lock()
            .get(upload_id)
            .map(|u| u.dir.clone())
            .ok_or_else(|| no_such_upload(upload_id))?;
        fs::write(dir.join(format!("part-{:05}", part_number)), &body)?;
        Ok(())
    }

    fn complete_multipart_upload(&self, upload_id: &str) -> ClientResult<()> {
        let upload = self
            .uploads
            .lock()
            .remove(upload_id)
            .ok_or_else(|| no_such_upload(upload_id))?;

        let mut parts: Vec<PathBuf> = fs::read_dir(&upload.dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        // Zero-padded names sort in part-number order
        parts.sort();

        let staging = self.staging_path(&upload.bucket)?;
        {
            let mut out = File::create(&staging)?;
            for part in &parts {
                let mut input = File::open(part)?;
                std::io::copy(&mut input, &mut out)?;
            }
            out.flush()?;
            out.sync_all()?;
        }
        fs::remove_dir_all(&upload.dir)?;

        self.commit(
            &upload.bucket,
            &upload.key,
            &staging,
            upload.metadata,
            upload.encryption,
        )
    }

    fn abort_multipart_upload(&self, upload_id: &str) -> ClientResult<()> {
        if let Some(upload) = self.uploads.lock().remove(upload_id) {
            match fs::remove_dir_all(&upload.dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

// =============================================================================
// Free Helpers
// =============================================================================

/// Keys map onto relative file paths, so they must be plain relative paths.
fn validate_key(key: &str) -> ClientResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.contains('\\')
        || key.split('/').any(|c| c.is_empty() || c == "." || c == "..");
    if bad {
        return Err(ClientError::other(format!("invalid object key: {:?}", key)));
    }
    Ok(())
}

fn no_such_upload(upload_id: &str) -> ClientError {
    ClientError::new(
        ClientErrorKind::ResourceNotFound,
        format!("no such upload: {}", upload_id),
    )
}

fn rename_into(from: &Path, to: &Path) -> ClientResult<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(from, to)?;
    Ok(())
}

fn file_crc32(path: &Path) -> ClientResult<u32> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Recursively collect file keys below `dir`, '/'-joined.
fn collect_keys(dir: &Path, prefix: String, out: &mut Vec<String>) -> ClientResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_keys(&entry.path(), key, out)?;
        } else if file_type.is_file() {
            out.push(key);
        }
    }
    Ok(())
}
