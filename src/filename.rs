//! Database file names
//!
//! Only two kinds of database files are ever written through the provider:
//! sorted table files (`000123.sst`) and the manifest (`MANIFEST-000004`).
//! Either may carry a trailing `-<epoch>` suffix when stored remotely.

use std::path::Path;

const SST_SUFFIX: &str = ".sst";
const MANIFEST_PREFIX: &str = "MANIFEST";

/// Role of a file handed to a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// Immutable sorted table, uploaded once on close
    Table,
    /// Frequently rewritten control file, uploaded on every sync
    Manifest,
}

impl FileRole {
    /// Classify a path by its file name, `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let name = remove_epoch(name);
        if is_manifest_file(name) {
            Some(FileRole::Manifest)
        } else if is_sst_file(name) {
            Some(FileRole::Table)
        } else {
            None
        }
    }
}

/// Strip a trailing `-<epoch>` from table names ("000010.sst-a1b2" → "000010.sst").
///
/// Manifest names are returned unchanged since their number already follows
/// a dash.
pub fn remove_epoch(name: &str) -> &str {
    if let Some(pos) = name.rfind(SST_SUFFIX) {
        let end = pos + SST_SUFFIX.len();
        if name[end..].starts_with('-') {
            return &name[..end];
        }
    }
    name
}

pub fn is_manifest_file(name: &str) -> bool {
    name.starts_with(MANIFEST_PREFIX)
}

pub fn is_sst_file(name: &str) -> bool {
    name.ends_with(SST_SUFFIX)
}

/// "000042.sst" → Some(42)
pub fn sst_file_number(name: &str) -> Option<u64> {
    let name = remove_epoch(name);
    let stem = name.strip_suffix(SST_SUFFIX)?;
    stem.parse().ok()
}

/// Append `value` as an unsigned LEB128 varint.
pub(crate) fn encode_varint64(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}
