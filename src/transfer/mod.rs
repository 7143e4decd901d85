//! Transfer Module
//!
//! Moves large objects in parts on a shared, bounded worker pool.
//!
//! ## Responsibilities
//! - Fixed-size pool of named worker threads (crossbeam channel fed)
//! - Parallel ranged GETs written at their offsets in the staging file
//! - Multipart upload with abort on any failed part
//!
//! The pool is created once by the caller and handed to every provider
//! that should share it; a provider never creates a hidden global one.

mod chunked;
mod pool;

pub(crate) use chunked::{download_in_parts, upload_in_parts};
pub use pool::TransferPool;
