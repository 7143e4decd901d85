//! Remote file handle tests
//!
//! - Readable: ranged reads, trimming, cursor, error translation
//! - Writable: table upload on close, manifest side file and sync protocol

#[path = "../common/mod.rs"]
mod common;

mod readable_tests;
