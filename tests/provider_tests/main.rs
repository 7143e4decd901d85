//! StorageProvider integration tests
//!
//! - Listing: pagination, prefix handling, error translation
//! - Objects: consistency-checked get/put, copy, delete, metadata, buckets
//! - Transfers: chunked download and multipart upload on the transfer pool
//! - Construction: option validation and destination bucket sanitizing

#[path = "../common/mod.rs"]
mod common;
