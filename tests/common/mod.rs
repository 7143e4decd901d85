//! Shared helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use cloudstore::client::{
    InMemoryClient, Metadata, ObjectClient, PutRequest, RequestCallback, RequestEvent, RequestOp,
};
use cloudstore::config::Encryption;
use cloudstore::{Config, StorageProvider};
use parking_lot::Mutex;

pub const BUCKET: &str = "test-bucket";
pub const REGION: &str = "us-west-2";

/// Requests observed through the provider's request callback
#[derive(Clone, Default)]
pub struct RequestLog {
    events: Arc<Mutex<Vec<RequestEvent>>>,
}

impl RequestLog {
    pub fn callback(&self) -> RequestCallback {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &RequestEvent| events.lock().push(*event))
    }

    pub fn count(&self, op: RequestOp) -> usize {
        self.events.lock().iter().filter(|e| e.op == op).count()
    }

    pub fn total(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Provider over a fresh in-memory store whose destination bucket exists
pub fn memory_provider() -> (Arc<InMemoryClient>, StorageProvider, RequestLog) {
    memory_provider_with(Config::builder().dest_bucket(BUCKET, REGION).build())
}

pub fn memory_provider_with(config: Config) -> (Arc<InMemoryClient>, StorageProvider, RequestLog) {
    let client = Arc::new(InMemoryClient::new());
    let log = RequestLog::default();
    let provider = StorageProvider::builder(config)
        .client(client.clone() as Arc<dyn ObjectClient>)
        .request_callback(log.callback())
        .build()
        .unwrap();
    log.clear();
    (client, provider, log)
}

/// Store an object directly, bypassing the provider
pub fn put_raw(client: &InMemoryClient, bucket: &str, key: &str, data: &[u8]) {
    client
        .put_object(PutRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body: Bytes::copy_from_slice(data),
            metadata: Metadata::new(),
            encryption: Encryption::Disabled,
        })
        .unwrap();
}

pub fn write_local(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
