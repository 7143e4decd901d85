//! Chunked download and upload

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel;

use crate::client::{ByteRange, ClientError, MultipartRequest, ObjectClient};
use crate::error::{CloudError, Result};

use super::TransferPool;

/// Split `size` bytes into `(part_number, offset, len)` parts
fn plan_parts(size: u64, part_size: u64) -> Vec<(u32, u64, u64)> {
    let mut parts = Vec::new();
    let mut offset = 0;
    let mut number = 1;
    while offset < size {
        let len = part_size.min(size - offset);
        parts.push((number, offset, len));
        offset += len;
        number += 1;
    }
    parts
}

/// Download `bucket/key` into `dest` with parallel ranged GETs.
///
/// Returns the size the store reported for the object. The caller compares
/// it with what actually landed on disk.
pub(crate) fn download_in_parts(
    client: &Arc<dyn ObjectClient>,
    pool: &TransferPool,
    bucket: &str,
    key: &str,
    dest: &Path,
    part_size: u64,
) -> Result<u64> {
    let remote_size = client
        .head_object(bucket, key)
        .map_err(|e| CloudError::from_client(key, e))?
        .content_length;

    let mut file = File::create(dest)?;
    let parts = plan_parts(remote_size, part_size);
    let (tx, rx) = channel::unbounded::<(u64, u64, std::result::Result<Bytes, ClientError>)>();

    for &(_, offset, len) in &parts {
        let worker_client = Arc::clone(client);
        let tx = tx.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        pool.execute(move || {
            let result = worker_client
                .get_object(&bucket, &key, Some(ByteRange::with_len(offset, len)))
                .map(|out| out.body);
            // Receiver is gone only if the download already failed
            let _ = tx.send((offset, len, result));
        })?;
    }
    drop(tx);

    for _ in 0..parts.len() {
        let (offset, len, result) = rx
            .recv()
            .map_err(|_| CloudError::Transfer(format!("download of {} lost a part", key)))?;
        let body = result.map_err(|e| {
            tracing::error!(bucket, key, offset, error = %e, "ranged download failed");
            CloudError::from_client(key, e)
        })?;
        if body.len() as u64 != len {
            tracing::error!(bucket, key, offset, expected = len, got = body.len(), "short part");
            return Err(CloudError::Transfer(format!(
                "short part for {} at offset {}: expected {} bytes, got {}",
                key,
                offset,
                len,
                body.len()
            )));
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&body)?;
    }

    file.sync_all()?;
    tracing::debug!(bucket, key, parts = parts.len(), remote_size, "chunked download finished");
    Ok(remote_size)
}

/// Upload `local` (of `size` bytes) as a multipart upload.
///
/// Any failed part aborts the whole upload so no partial object is created.
pub(crate) fn upload_in_parts(
    client: &Arc<dyn ObjectClient>,
    pool: &TransferPool,
    local: &Path,
    request: MultipartRequest,
    size: u64,
    part_size: u64,
) -> Result<()> {
    let key = request.key.clone();
    let upload_id = client
        .create_multipart_upload(&request)
        .map_err(|e| CloudError::from_client(&key, e))?;

    let parts = plan_parts(size, part_size);
    let (tx, rx) = channel::unbounded::<(u32, std::result::Result<(), ClientError>)>();

    for &(number, offset, len) in &parts {
        let worker_client = Arc::clone(client);
        let tx = tx.clone();
        let part_upload_id = upload_id.clone();
        let local: PathBuf = local.to_path_buf();
        let queued = pool.execute(move || {
            let result = read_part(&local, offset, len)
                .map_err(ClientError::from)
                .and_then(|body| worker_client.upload_part(&part_upload_id, number, body));
            let _ = tx.send((number, result));
        });
        if let Err(e) = queued {
            abort(client.as_ref(), &upload_id, &key);
            return Err(e);
        }
    }
    drop(tx);

    let mut failure = None;
    for _ in 0..parts.len() {
        match rx.recv() {
            Ok((_, Ok(()))) => {}
            Ok((number, Err(e))) => {
                tracing::error!(key = %key, part = number, error = %e, "part upload failed");
                failure.get_or_insert(CloudError::from_client(&key, e));
            }
            Err(_) => {
                failure.get_or_insert(CloudError::Transfer(format!(
                    "upload of {} lost a part",
                    key
                )));
                break;
            }
        }
    }

    if let Some(err) = failure {
        abort(client.as_ref(), &upload_id, &key);
        return Err(err);
    }

    client
        .complete_multipart_upload(&upload_id)
        .map_err(|e| CloudError::from_client(&key, e))?;
    tracing::debug!(key = %key, parts = parts.len(), size, "multipart upload finished");
    Ok(())
}

fn abort(client: &dyn ObjectClient, upload_id: &str, key: &str) {
    if let Err(e) = client.abort_multipart_upload(upload_id) {
        tracing::warn!(key, upload_id, error = %e, "failed to abort multipart upload");
    }
}

fn read_part(path: &Path, offset: u64, len: u64) -> std::io::Result<Bytes> {
    let mut file = OpenOptions::new().read(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)?;
    Ok(Bytes::from(buf))
}
