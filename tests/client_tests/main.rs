//! Object store client tests
//!
//! These tests verify:
//! - LocalDirClient bucket and object semantics on a temp directory
//! - Listing order and truncation without an explicit marker
//! - Range reads, metadata sidecars and checksums
//! - Multipart upload assembly and abort
//! - InMemoryClient fault injection and the instrumentation wrapper

use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use cloudstore::client::{
    ByteRange, ClientErrorKind, CopyRequest, InMemoryClient, InstrumentedClient, ListRequest,
    LocalDirClient, Metadata, MultipartRequest, ObjectClient, PutRequest, RequestEvent, RequestOp,
};
use cloudstore::config::Encryption;
use tempfile::TempDir;

const BUCKET: &str = "bucket";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_local() -> (TempDir, LocalDirClient) {
    let dir = TempDir::new().unwrap();
    let client = LocalDirClient::open(dir.path()).unwrap();
    client.create_bucket(BUCKET, Some("local")).unwrap();
    (dir, client)
}

fn put(client: &dyn ObjectClient, key: &str, data: &[u8]) {
    client
        .put_object(PutRequest {
            bucket: BUCKET.to_string(),
            key: key.to_string(),
            body: Bytes::copy_from_slice(data),
            metadata: Metadata::new(),
            encryption: Encryption::Disabled,
        })
        .unwrap();
}

fn list(client: &dyn ObjectClient, prefix: &str, marker: &str, max_keys: usize) -> (Vec<String>, bool) {
    let page = client
        .list_objects(&ListRequest {
            bucket: BUCKET.to_string(),
            prefix: prefix.to_string(),
            marker: marker.to_string(),
            max_keys,
        })
        .unwrap();
    (page.keys, page.is_truncated)
}

// =============================================================================
// Bucket Tests
// =============================================================================

#[test]
fn test_local_create_bucket_twice() {
    let (_dir, client) = setup_local();

    let err = client.create_bucket(BUCKET, None).unwrap_err();

    assert_eq!(err.kind, ClientErrorKind::BucketAlreadyOwnedByYou);
    client.head_bucket(BUCKET).unwrap();
}

#[test]
fn test_local_missing_bucket() {
    let (_dir, client) = setup_local();

    assert_eq!(client.head_bucket("other").unwrap_err().kind, ClientErrorKind::NoSuchBucket);
    assert_eq!(
        client.head_object("other", "key").unwrap_err().kind,
        ClientErrorKind::NoSuchBucket
    );
}

#[test]
fn test_local_rejects_bad_bucket_names() {
    let (_dir, client) = setup_local();

    for name in ["", "a/b", ".hidden"] {
        assert!(client.create_bucket(name, None).is_err(), "{:?}", name);
    }
}

// =============================================================================
// Object Tests
// =============================================================================

#[test]
fn test_local_put_get_head() {
    let (_dir, client) = setup_local();
    put(&client, "db/000001.sst", b"hello world");

    let out = client.get_object(BUCKET, "db/000001.sst", None).unwrap();
    assert_eq!(out.body.as_ref(), b"hello world");
    assert_eq!(out.content_length, 11);

    let head = client.head_object(BUCKET, "db/000001.sst").unwrap();
    assert_eq!(head.content_length, 11);
    assert!(head.last_modified_ms > 0);
}

#[test]
fn test_local_missing_key() {
    let (_dir, client) = setup_local();

    assert_eq!(
        client.get_object(BUCKET, "db/none", None).unwrap_err().kind,
        ClientErrorKind::NoSuchKey
    );
    assert_eq!(
        client.head_object(BUCKET, "db/none").unwrap_err().kind,
        ClientErrorKind::NoSuchKey
    );
}

#[test]
fn test_local_range_reads() {
    let (_dir, client) = setup_local();
    put(&client, "obj", b"0123456789");

    let out = client
        .get_object(BUCKET, "obj", Some(ByteRange::with_len(2, 3)))
        .unwrap();
    assert_eq!(out.body.as_ref(), b"234");

    // Ranges past the end are clipped
    let out = client
        .get_object(BUCKET, "obj", Some(ByteRange { start: 8, end: 100 }))
        .unwrap();
    assert_eq!(out.body.as_ref(), b"89");

    assert!(client
        .get_object(BUCKET, "obj", Some(ByteRange::with_len(10, 1)))
        .is_err());
}

#[test]
fn test_local_detects_corruption() {
    let (dir, client) = setup_local();
    put(&client, "db/000001.sst", b"original");

    let object = dir.path().join(BUCKET).join("objects").join("db").join("000001.sst");
    fs::write(&object, b"tampered").unwrap();

    let err = client.get_object(BUCKET, "db/000001.sst", None).unwrap_err();
    assert_eq!(err.kind, ClientErrorKind::Other);
    assert!(err.message.contains("checksum"));
}

#[test]
fn test_local_whole_reads_never_see_torn_put() {
    let (_dir, client) = setup_local();
    let client = Arc::new(client);
    put(&*client, "db/MANIFEST-000001", &[0u8; 4096]);
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let client = Arc::clone(&client);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 1..=300u32 {
                put(&*client, "db/MANIFEST-000001", &[(i % 251) as u8; 4096]);
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut reads = 0usize;
    while !done.load(Ordering::SeqCst) || reads == 0 {
        let out = client
            .get_object(BUCKET, "db/MANIFEST-000001", None)
            .unwrap();
        assert_eq!(out.body.len(), 4096);
        assert!(out.body.iter().all(|b| *b == out.body[0]));
        reads += 1;
    }
    writer.join().unwrap();
}

#[test]
fn test_local_rejects_bad_keys() {
    let (_dir, client) = setup_local();

    for key in ["", "/abs", "dir/", "a//b", "../escape", "a/./b", "back\\slash"] {
        let result = client.put_object(PutRequest {
            bucket: BUCKET.to_string(),
            key: key.to_string(),
            body: Bytes::from_static(b"x"),
            metadata: Metadata::new(),
            encryption: Encryption::Disabled,
        });
        assert!(result.is_err(), "{:?} accepted", key);
    }
}

#[test]
fn test_local_delete() {
    let (_dir, client) = setup_local();
    put(&client, "db/000001.sst", b"x");

    client.delete_object(BUCKET, "db/000001.sst").unwrap();
    client.delete_object(BUCKET, "db/000001.sst").unwrap();

    assert_eq!(
        client.head_object(BUCKET, "db/000001.sst").unwrap_err().kind,
        ClientErrorKind::NoSuchKey
    );
}

#[test]
fn test_local_copy_and_metadata() {
    let (_dir, client) = setup_local();
    let mut metadata = Metadata::new();
    metadata.insert("owner".to_string(), "db".to_string());
    client
        .put_object(PutRequest {
            bucket: BUCKET.to_string(),
            key: "src".to_string(),
            body: Bytes::from_static(b"payload"),
            metadata: metadata.clone(),
            encryption: Encryption::ServerManaged,
        })
        .unwrap();

    let mut request = CopyRequest {
        src_bucket: BUCKET.to_string(),
        src_key: "src".to_string(),
        dest_bucket: BUCKET.to_string(),
        dest_key: "dst/copy".to_string(),
        metadata: None,
        encryption: Encryption::Disabled,
    };
    client.copy_object(&request).unwrap();
    assert_eq!(client.head_object(BUCKET, "dst/copy").unwrap().metadata, metadata);

    // Self-copy replacing metadata keeps the content
    let mut replaced = Metadata::new();
    replaced.insert("owner".to_string(), "backup".to_string());
    request.dest_key = "src".to_string();
    request.metadata = Some(replaced.clone());
    client.copy_object(&request).unwrap();

    assert_eq!(client.head_object(BUCKET, "src").unwrap().metadata, replaced);
    assert_eq!(
        client.get_object(BUCKET, "src", None).unwrap().body.as_ref(),
        b"payload"
    );
}

// =============================================================================
// Listing Tests
// =============================================================================

#[test]
fn test_local_listing_order_and_truncation() {
    let (_dir, client) = setup_local();
    for key in ["db/b", "db/a", "db/sub/c", "db2/x", "top"] {
        put(&client, key, b"x");
    }

    let (keys, truncated) = list(&client, "db/", "", 2);
    assert_eq!(keys, vec!["db/a", "db/b"]);
    assert!(truncated);

    let (keys, truncated) = list(&client, "db/", "db/b", 2);
    assert_eq!(keys, vec!["db/sub/c"]);
    assert!(!truncated);

    let (keys, _) = list(&client, "", "", 10);
    assert_eq!(keys, vec!["db/a", "db/b", "db/sub/c", "db2/x", "top"]);
}

#[test]
fn test_local_listing_ignores_sidecars_and_staging() {
    let (_dir, client) = setup_local();
    put(&client, "a", b"x");
    let id = client
        .create_multipart_upload(&MultipartRequest {
            bucket: BUCKET.to_string(),
            key: "pending".to_string(),
            metadata: Metadata::new(),
            encryption: Encryption::Disabled,
        })
        .unwrap();
    client.upload_part(&id, 1, Bytes::from_static(b"part")).unwrap();

    let (keys, _) = list(&client, "", "", 10);

    assert_eq!(keys, vec!["a"]);
}

// =============================================================================
// Multipart Tests
// =============================================================================

fn multipart(client: &dyn ObjectClient, key: &str) -> String {
    client
        .create_multipart_upload(&MultipartRequest {
            bucket: BUCKET.to_string(),
            key: key.to_string(),
            metadata: Metadata::new(),
            encryption: Encryption::ServerManaged,
        })
        .unwrap()
}

#[test]
fn test_local_multipart_assembles_in_order() {
    let (_dir, client) = setup_local();
    let id = multipart(&client, "db/big.sst");

    client.upload_part(&id, 2, Bytes::from_static(b"-two")).unwrap();
    client.upload_part(&id, 1, Bytes::from_static(b"one")).unwrap();
    client.upload_part(&id, 3, Bytes::from_static(b"-three")).unwrap();
    client.complete_multipart_upload(&id).unwrap();

    let out = client.get_object(BUCKET, "db/big.sst", None).unwrap();
    assert_eq!(out.body.as_ref(), b"one-two-three");
    assert_eq!(
        client.complete_multipart_upload(&id).unwrap_err().kind,
        ClientErrorKind::ResourceNotFound
    );
}

#[test]
fn test_local_multipart_abort() {
    let (_dir, client) = setup_local();
    let id = multipart(&client, "db/big.sst");
    client.upload_part(&id, 1, Bytes::from_static(b"one")).unwrap();

    client.abort_multipart_upload(&id).unwrap();

    assert!(client.upload_part(&id, 2, Bytes::from_static(b"x")).is_err());
    assert_eq!(
        client.head_object(BUCKET, "db/big.sst").unwrap_err().kind,
        ClientErrorKind::NoSuchKey
    );
}

#[test]
fn test_memory_multipart() {
    let client = InMemoryClient::new();
    client.create_bucket(BUCKET, None).unwrap();
    let id = multipart(&client, "k");

    client.upload_part(&id, 1, Bytes::from_static(b"ab")).unwrap();
    client.upload_part(&id, 2, Bytes::from_static(b"cd")).unwrap();
    assert_eq!(client.pending_uploads(), 1);
    client.complete_multipart_upload(&id).unwrap();

    let object = client.object(BUCKET, "k").unwrap();
    assert_eq!(object.data.as_ref(), b"abcd");
    assert_eq!(object.encryption, Encryption::ServerManaged);
    assert_eq!(client.pending_uploads(), 0);
}

#[test]
fn test_memory_listing_reports_marker() {
    let client = InMemoryClient::new();
    client.create_bucket(BUCKET, None).unwrap();
    for key in ["a", "b", "c"] {
        put(&client, key, b"x");
    }

    let page = client
        .list_objects(&ListRequest {
            bucket: BUCKET.to_string(),
            prefix: String::new(),
            marker: String::new(),
            max_keys: 2,
        })
        .unwrap();
    assert!(page.is_truncated);
    assert_eq!(page.next_marker.as_deref(), Some("b"));

    client.set_omit_next_marker(true);
    let (keys, truncated) = list(&client, "", "", 2);
    assert_eq!(keys, vec!["a", "b"]);
    assert!(truncated);
}

// =============================================================================
// Instrumentation Tests
// =============================================================================

#[test]
fn test_instrumented_client_reports_requests() {
    let inner = Arc::new(InMemoryClient::new());
    let reads = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let (r, f) = (Arc::clone(&reads), Arc::clone(&failures));
    let client = InstrumentedClient::new(
        inner,
        Arc::new(move |event: &RequestEvent| {
            if event.op == RequestOp::Read {
                r.fetch_add(event.size as usize, Ordering::SeqCst);
            }
            if !event.success {
                f.fetch_add(1, Ordering::SeqCst);
            }
        }),
    );

    client.create_bucket(BUCKET, None).unwrap();
    put(&client, "k", b"0123456789");
    client
        .get_object(BUCKET, "k", Some(ByteRange::with_len(0, 4)))
        .unwrap();
    assert!(client.head_object(BUCKET, "missing").is_err());

    assert_eq!(client.name(), "memory");
    assert_eq!(reads.load(Ordering::SeqCst), 4);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}
