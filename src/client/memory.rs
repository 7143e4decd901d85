//! In-memory object store
//!
//! A process-local backend with the same ordering guarantees as a real
//! store. Useful for tests and ephemeral databases; faults can be injected
//! per object to exercise the provider's error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};

use crate::config::Encryption;

use super::{
    now_millis, ByteRange, ClientError, ClientErrorKind, ClientResult, CopyRequest, GetOutput,
    HeadOutput, ListPage, ListRequest, Metadata, MultipartRequest, ObjectClient, PutRequest,
};

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub metadata: Metadata,
    pub last_modified_ms: u64,
    pub encryption: Encryption,
}

/// Failure injected for one object
#[derive(Debug, Clone)]
pub enum Fault {
    /// Every request touching the object fails with this error
    Error(ClientError),
    /// GET bodies lose this many trailing bytes while still reporting the
    /// full content length
    ShortRead(usize),
}

#[derive(Debug, Default)]
struct MemBucket {
    region: Option<String>,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    metadata: Metadata,
    encryption: Encryption,
    parts: BTreeMap<u32, Bytes>,
}

/// In-memory [`ObjectClient`]
///
/// ## Concurrency:
/// - `buckets`: RwLock (listing/reads share, writes exclusive)
/// - `uploads`, `faults`: Mutex, touched briefly per request
#[derive(Debug, Default)]
pub struct InMemoryClient {
    buckets: RwLock<BTreeMap<String, MemBucket>>,
    uploads: Mutex<HashMap<String, PendingUpload>>,
    faults: Mutex<HashMap<(String, String), Fault>>,
    omit_next_marker: AtomicBool,
    next_upload_id: AtomicU64,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop reporting `next_marker` on truncated pages
    pub fn set_omit_next_marker(&self, omit: bool) {
        self.omit_next_marker.store(omit, Ordering::SeqCst);
    }

    /// Inject a fault for one object (replaces any previous fault)
    pub fn inject_fault(&self, bucket: &str, key: &str, fault: Fault) {
        self.faults
            .lock()
            .insert((bucket.to_string(), key.to_string()), fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Snapshot of a stored object (for testing/debugging)
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .cloned()
    }

    /// Region a bucket was created with
    pub fn bucket_region(&self, bucket: &str) -> Option<String> {
        self.buckets.read().get(bucket).and_then(|b| b.region.clone())
    }

    /// Number of objects in a bucket (0 if it does not exist)
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .get(bucket)
            .map(|b| b.objects.len())
            .unwrap_or(0)
    }

    /// Number of multipart uploads started but not completed or aborted
    pub fn pending_uploads(&self) -> usize {
        self.uploads.lock().len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn fault(&self, bucket: &str, key: &str) -> Option<Fault> {
        self.faults
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    fn check_error_fault(&self, bucket: &str, key: &str) -> ClientResult<()> {
        match self.fault(bucket, key) {
            Some(Fault::Error(err)) => Err(err),
            _ => Ok(()),
        }
    }

    fn store(&self, bucket: &str, key: &str, object: StoredObject) -> ClientResult<()> {
        let mut buckets = self.buckets.write();
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        entry.objects.insert(key.to_string(), object);
        Ok(())
    }
}

impl ObjectClient for InMemoryClient {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_bucket(&self, bucket: &str, region: Option<&str>) -> ClientResult<()> {
        let mut buckets = self.buckets.write();
        if buckets.contains_key(bucket) {
            return Err(ClientError::new(
                ClientErrorKind::BucketAlreadyOwnedByYou,
                format!("bucket {} already exists", bucket),
            ));
        }
        buckets.insert(
            bucket.to_string(),
            MemBucket {
                region: region.map(str::to_string),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn head_bucket(&self, bucket: &str) -> ClientResult<()> {
        if self.buckets.read().contains_key(bucket) {
            Ok(())
        } else {
            Err(ClientError::no_such_bucket(bucket))
        }
    }

    fn list_objects(&self, request: &ListRequest) -> ClientResult<ListPage> {
        let buckets = self.buckets.read();
        let bucket = buckets
            .get(&request.bucket)
            .ok_or_else(|| ClientError::no_such_bucket(&request.bucket))?;

        // BTreeMap iteration is already in lexicographic key order
        let mut keys: Vec<String> = bucket
            .objects
            .keys()
            .filter(|k| k.as_str() > request.marker.as_str() && k.starts_with(&request.prefix))
            .take(request.max_keys + 1)
            .cloned()
            .collect();

        let is_truncated = keys.len() > request.max_keys;
        keys.truncate(request.max_keys);

        let next_marker = if is_truncated && !self.omit_next_marker.load(Ordering::SeqCst) {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage {
            keys,
            is_truncated,
            next_marker,
        })
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ClientResult<GetOutput> {
        let fault = self.fault(bucket, key);
        if let Some(Fault::Error(err)) = fault {
            return Err(err);
        }

        let object = {
            let buckets = self.buckets.read();
            let b = buckets
                .get(bucket)
                .ok_or_else(|| ClientError::no_such_bucket(bucket))?;
            b.objects
                .get(key)
                .cloned()
                .ok_or_else(|| ClientError::no_such_key(key))?
        };

        let size = object.data.len() as u64;
        let body = match range {
            None => object.data,
            Some(r) => {
                if r.start >= size {
                    return Err(ClientError::other(format!(
                        "invalid range {} for object of size {}",
                        r, size
                    )));
                }
                let end = r.end.min(size - 1);
                object.data.slice(r.start as usize..=end as usize)
            }
        };

        let content_length = body.len() as u64;
        let body = match fault {
            Some(Fault::ShortRead(missing)) => {
                body.slice(..body.len().saturating_sub(missing))
            }
            _ => body,
        };

        Ok(GetOutput {
            body,
            content_length,
        })
    }

    fn head_object(&self, bucket: &str, key: &str) -> ClientResult<HeadOutput> {
        self.check_error_fault(bucket, key)?;
        let buckets = self.buckets.read();
        let b = buckets
            .get(bucket)
            .ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        let object = b
            .objects
            .get(key)
            .ok_or_else(|| ClientError::no_such_key(key))?;
        Ok(HeadOutput {
            content_length: object.data.len() as u64,
            last_modified_ms: object.last_modified_ms,
            metadata: object.metadata.clone(),
        })
    }

    fn put_object(&self, request: PutRequest) -> ClientResult<()> {
        self.check_error_fault(&request.bucket, &request.key)?;
        self.store(
            &request.bucket,
            &request.key,
            StoredObject {
                data: request.body,
                metadata: request.metadata,
                last_modified_ms: now_millis(),
                encryption: request.encryption,
            },
        )
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.check_error_fault(bucket, key)?;
        let mut buckets = self.buckets.write();
        let b = buckets
            .get_mut(bucket)
            .ok_or_else(|| ClientError::no_such_bucket(bucket))?;
        // Deleting a missing key succeeds, as on S3
        b.objects.remove(key);
        Ok(())
    }

    fn copy_object(&self, request: &CopyRequest) -> ClientResult<()> {
        self.check_error_fault(&request.src_bucket, &request.src_key)?;
        let source = {
            let buckets = self.buckets.read();
            let b = buckets
                .get(&request.src_bucket)
                .ok_or_else(|| ClientError::no_such_bucket(&request.src_bucket))?;
            b.objects
                .get(&request.src_key)
                .cloned()
                .ok_or_else(|| ClientError::no_such_key(&request.src_key))?
        };

        self.store(
            &request.dest_bucket,
            &request.dest_key,
            StoredObject {
                data: source.data,
                metadata: request.metadata.clone().unwrap_or(source.metadata),
                last_modified_ms: now_millis(),
                encryption: request.encryption.clone(),
            },
        )
    }

    fn create_multipart_upload(&self, request: &MultipartRequest) -> ClientResult<String> {
        self.check_error_fault(&request.bucket, &request.key)?;
        self.head_bucket(&request.bucket)?;

        let id = format!("mem-upload-{}", self.next_upload_id.fetch_add(1, Ordering::SeqCst));
        self.uploads.lock().insert(
            id.clone(),
            PendingUpload {
                bucket: request.bucket.clone(),
                key: request.key.clone(),
                metadata: request.metadata.clone(),
                encryption: request.encryption.clone(),
                parts: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    fn upload_part(&self, upload_id: &str, part_number: u32, body: Bytes) -> ClientResult<()> {
        let mut uploads = self.uploads.lock();
        let upload = uploads.get_mut(upload_id).ok_or_else(|| {
            ClientError::new(
                ClientErrorKind::ResourceNotFound,
                format!("no such upload: {}", upload_id),
            )
        })?;
        if let Some(Fault::Error(err)) = self.fault(&upload.bucket, &upload.key) {
            return Err(err);
        }
        upload.parts.insert(part_number, body);
        Ok(())
    }

    fn complete_multipart_upload(&self, upload_id: &str) -> ClientResult<()> {
        let upload = self.uploads.lock().remove(upload_id).ok_or_else(|| {
            ClientError::new(
                ClientErrorKind::ResourceNotFound,
                format!("no such upload: {}", upload_id),
            )
        })?;

        let total: usize = upload.parts.values().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for part in upload.parts.values() {
            data.extend_from_slice(part);
        }

        self.store(
            &upload.bucket,
            &upload.key,
            StoredObject {
                data: data.freeze(),
                metadata: upload.metadata,
                last_modified_ms: now_millis(),
                encryption: upload.encryption,
            },
        )
    }

    fn abort_multipart_upload(&self, upload_id: &str) -> ClientResult<()> {
        self.uploads.lock().remove(upload_id);
        Ok(())
    }
}
