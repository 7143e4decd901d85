//! # cloudstore
//!
//! Object-store backed file storage for an LSM database:
//! - Bucket management and directory simulation over a flat key namespace
//! - Size-verified whole-object downloads and uploads
//! - Ranged reads of remote table files
//! - Crash-safe manifest rewrites with remote re-upload on every sync
//! - Pluggable object store clients (in-memory, local directory)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Database Engine                       │
//! └────────────┬──────────────────────────────┬──────────────┘
//!              │                              │
//!              ▼                              ▼
//!   ┌────────────────────┐         ┌────────────────────┐
//!   │ CloudReadableFile  │         │ CloudWritableFile  │
//!   │  (ranged GETs)     │         │ (local staging)    │
//!   └─────────┬──────────┘         └─────────┬──────────┘
//!             │                              │
//!             ▼                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                   StorageProvider                        │
//! │    (listing, get/put, copy, delete, error mapping)       │
//! └────────────┬──────────────────────────────┬──────────────┘
//!              │                              │
//!              ▼                              ▼
//!   ┌────────────────────┐         ┌────────────────────┐
//!   │   ObjectClient     │◀────────│   TransferPool     │
//!   │ (memory / local)   │         │ (chunked transfer) │
//!   └────────────────────┘         └────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod paths;
pub mod filename;
pub mod client;
pub mod transfer;
pub mod provider;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CloudError, Result};
pub use config::Config;
pub use provider::{CloudReadableFile, CloudWritableFile, ObjectInfo, ProviderBuilder, StorageProvider};
pub use transfer::TransferPool;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of cloudstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
