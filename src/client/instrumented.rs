//! Request instrumentation
//!
//! Wraps a client and reports every remote call (kind, bytes, latency,
//! outcome) to a user callback, e.g. for metrics or request accounting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::{
    ByteRange, ClientResult, CopyRequest, GetOutput, HeadOutput, ListPage, ListRequest,
    MultipartRequest, ObjectClient, PutRequest,
};

/// Kind of remote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOp {
    List,
    Create,
    Info,
    Delete,
    Copy,
    Read,
    Write,
}

/// One completed remote request
#[derive(Debug, Clone, Copy)]
pub struct RequestEvent {
    pub op: RequestOp,
    /// Payload bytes moved (0 when unknown or not applicable)
    pub size: u64,
    pub elapsed: Duration,
    pub success: bool,
}

/// Callback invoked after every remote request
pub type RequestCallback = Arc<dyn Fn(&RequestEvent) + Send + Sync>;

/// [`ObjectClient`] decorator that reports a [`RequestEvent`] per call
pub struct InstrumentedClient {
    inner: Arc<dyn ObjectClient>,
    callback: RequestCallback,
}

impl InstrumentedClient {
    pub fn new(inner: Arc<dyn ObjectClient>, callback: RequestCallback) -> Self {
        Self { inner, callback }
    }

    fn track<T>(
        &self,
        op: RequestOp,
        size: impl FnOnce(&T) -> u64,
        call: impl FnOnce() -> ClientResult<T>,
    ) -> ClientResult<T> {
        let start = Instant::now();
        let result = call();
        let event = RequestEvent {
            op,
            size: result.as_ref().map(size).unwrap_or(0),
            elapsed: start.elapsed(),
            success: result.is_ok(),
        };
        (self.callback)(&event);
        result
    }
}

impl ObjectClient for InstrumentedClient {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn create_bucket(&self, bucket: &str, region: Option<&str>) -> ClientResult<()> {
        self.track(RequestOp::Create, |_| 0, || self.inner.create_bucket(bucket, region))
    }

    fn head_bucket(&self, bucket: &str) -> ClientResult<()> {
        self.track(RequestOp::Info, |_| 0, || self.inner.head_bucket(bucket))
    }

    fn list_objects(&self, request: &ListRequest) -> ClientResult<ListPage> {
        self.track(RequestOp::List, |_| 0, || self.inner.list_objects(request))
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ClientResult<GetOutput> {
        self.track(
            RequestOp::Read,
            |out: &GetOutput| out.content_length,
            || self.inner.get_object(bucket, key, range),
        )
    }

    fn head_object(&self, bucket: &str, key: &str) -> ClientResult<HeadOutput> {
        self.track(RequestOp::Info, |_| 0, || self.inner.head_object(bucket, key))
    }

    fn put_object(&self, request: PutRequest) -> ClientResult<()> {
        let size = request.body.len() as u64;
        self.track(RequestOp::Write, |_| size, || self.inner.put_object(request))
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.track(RequestOp::Delete, |_| 0, || self.inner.delete_object(bucket, key))
    }

    fn copy_object(&self, request: &CopyRequest) -> ClientResult<()> {
        self.track(RequestOp::Copy, |_| 0, || self.inner.copy_object(request))
    }

    fn create_multipart_upload(&self, request: &MultipartRequest) -> ClientResult<String> {
        self.track(RequestOp::Create, |_| 0, || {
            self.inner.create_multipart_upload(request)
        })
    }

    fn upload_part(&self, upload_id: &str, part_number: u32, body: Bytes) -> ClientResult<()> {
        let size = body.len() as u64;
        self.track(RequestOp::Write, |_| size, || {
            self.inner.upload_part(upload_id, part_number, body)
        })
    }

    fn complete_multipart_upload(&self, upload_id: &str) -> ClientResult<()> {
        self.track(RequestOp::Write, |_| 0, || {
            self.inner.complete_multipart_upload(upload_id)
        })
    }

    fn abort_multipart_upload(&self, upload_id: &str) -> ClientResult<()> {
        self.track(RequestOp::Delete, |_| 0, || {
            self.inner.abort_multipart_upload(upload_id)
        })
    }
}
