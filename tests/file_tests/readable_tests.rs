//! Tests for CloudReadableFile

use std::io::Read;
use std::sync::Arc;
use std::thread;

use cloudstore::client::{ClientError, Fault, RequestOp};

use crate::common::{memory_provider, payload, put_raw, BUCKET};

const PATH: &str = "db/000042.sst";

// =============================================================================
// Range Tests
// =============================================================================

#[test]
fn test_read_at_within_file() {
    let (client, provider, log) = memory_provider();
    let data = payload(100);
    put_raw(&client, BUCKET, PATH, &data);
    let file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();
    log.clear();

    let got = file.read_at(10, 20).unwrap();

    assert_eq!(got.as_ref(), &data[10..30]);
    assert_eq!(log.count(RequestOp::Read), 1);
}

#[test]
fn test_read_crossing_end_is_trimmed() {
    let (client, provider, _log) = memory_provider();
    let data = payload(100);
    put_raw(&client, BUCKET, PATH, &data);
    let file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();

    let got = file.read_at(90, 50).unwrap();

    assert_eq!(got.len(), 10);
    assert_eq!(got.as_ref(), &data[90..]);
}

#[test]
fn test_read_past_end_returns_nothing() {
    let (client, provider, log) = memory_provider();
    put_raw(&client, BUCKET, PATH, &payload(100));
    let file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();
    log.clear();

    assert!(file.read_at(100, 10).unwrap().is_empty());
    assert!(file.read_at(5000, 1).unwrap().is_empty());
    assert_eq!(log.total(), 0);
}

#[test]
fn test_zero_length_read() {
    let (client, provider, log) = memory_provider();
    put_raw(&client, BUCKET, PATH, &payload(100));
    let file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();
    log.clear();

    let got = file.read_at(10, 0).unwrap();

    assert!(got.is_empty());
    assert_eq!(log.count(RequestOp::Read), 1);
}

#[test]
fn test_size_is_fixed_at_open() {
    let (client, provider, log) = memory_provider();
    put_raw(&client, BUCKET, PATH, &payload(100));
    let file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();
    put_raw(&client, BUCKET, PATH, &payload(200));
    log.clear();

    assert_eq!(file.size(), 100);
    assert_eq!(file.read_at(50, 100).unwrap().len(), 50);
    assert_eq!(log.count(RequestOp::Info), 0);
}

// =============================================================================
// Sequential Read Tests
// =============================================================================

#[test]
fn test_sequential_reads_advance_cursor() {
    let (client, provider, _log) = memory_provider();
    let data = payload(25);
    put_raw(&client, BUCKET, PATH, &data);
    let mut file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();

    assert_eq!(file.read(10).unwrap().as_ref(), &data[..10]);
    assert_eq!(file.read(10).unwrap().as_ref(), &data[10..20]);
    assert_eq!(file.read(10).unwrap().as_ref(), &data[20..]);
    assert_eq!(file.position(), 25);
    assert!(file.read(10).unwrap().is_empty());
}

#[test]
fn test_skip_is_clamped() {
    let (client, provider, _log) = memory_provider();
    let data = payload(30);
    put_raw(&client, BUCKET, PATH, &data);
    let mut file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();

    file.skip(12);
    assert_eq!(file.read(3).unwrap().as_ref(), &data[12..15]);

    file.skip(1000);
    assert_eq!(file.position(), 30);
    assert!(file.read(1).unwrap().is_empty());
}

#[test]
fn test_io_read_to_end() {
    let (client, provider, _log) = memory_provider();
    let data = payload(5000);
    put_raw(&client, BUCKET, PATH, &data);
    let mut file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();

    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();

    assert_eq!(out, data);
}

#[test]
fn test_concurrent_readers() {
    let (client, provider, _log) = memory_provider();
    let data = Arc::new(payload(4096));
    put_raw(&client, BUCKET, PATH, &data);
    let file = Arc::new(provider.new_cloud_readable_file(BUCKET, PATH).unwrap());

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let file = Arc::clone(&file);
            let data = Arc::clone(&data);
            thread::spawn(move || {
                for i in 0..16u64 {
                    let offset = (t * 1024 + i * 64) as usize;
                    let got = file.read_at(offset as u64, 64).unwrap();
                    assert_eq!(got.as_ref(), &data[offset..offset + 64]);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

// =============================================================================
// Identity Tests
// =============================================================================

#[test]
fn test_unique_id_for_table_files() {
    let (client, provider, _log) = memory_provider();
    put_raw(&client, BUCKET, "db/000042.sst", b"x");
    put_raw(&client, BUCKET, "db/000300.sst-epoch7", b"x");
    put_raw(&client, BUCKET, "db/MANIFEST-000001", b"x");

    let file = provider.new_cloud_readable_file(BUCKET, "db/000042.sst").unwrap();
    assert_eq!(file.unique_id(), Some(vec![42]));

    let file = provider.new_cloud_readable_file(BUCKET, "db/000300.sst-epoch7").unwrap();
    assert_eq!(file.unique_id(), Some(vec![0xac, 0x02]));

    let file = provider.new_cloud_readable_file(BUCKET, "db/MANIFEST-000001").unwrap();
    assert_eq!(file.unique_id(), None);
}

#[test]
fn test_unique_id_skips_file_number_zero() {
    let (client, provider, _log) = memory_provider();
    put_raw(&client, BUCKET, "db/000000.sst", b"x");

    let file = provider.new_cloud_readable_file(BUCKET, "db/000000.sst").unwrap();

    assert_eq!(file.unique_id(), None);
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_open_missing_object() {
    let (_client, provider, _log) = memory_provider();

    let err = provider.new_cloud_readable_file(BUCKET, PATH).unwrap_err();

    assert!(err.is_not_found());
}

#[test]
fn test_read_after_remote_delete_is_not_found() {
    let (client, provider, _log) = memory_provider();
    put_raw(&client, BUCKET, PATH, &payload(100));
    let file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();
    provider.delete_object(BUCKET, PATH).unwrap();

    let err = file.read_at(0, 10).unwrap_err();

    assert!(err.is_not_found());
}

#[test]
fn test_read_404_marker_is_not_found() {
    let (client, provider, _log) = memory_provider();
    put_raw(&client, BUCKET, PATH, &payload(100));
    let file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();
    client.inject_fault(
        BUCKET,
        PATH,
        Fault::Error(ClientError::other("Unable to parse ExceptionName: Response code: 404")),
    );

    let err = file.read_at(0, 10).unwrap_err();

    assert!(err.is_not_found());
}

#[test]
fn test_read_other_failure_is_io() {
    let (client, provider, _log) = memory_provider();
    put_raw(&client, BUCKET, PATH, &payload(100));
    let file = provider.new_cloud_readable_file(BUCKET, PATH).unwrap();
    client.inject_fault(BUCKET, PATH, Fault::Error(ClientError::other("slow down")));

    let err = file.read_at(0, 10).unwrap_err();

    assert!(!err.is_not_found());
    assert!(err.is_io());
    assert!(err.to_string().contains("slow down"));
}
