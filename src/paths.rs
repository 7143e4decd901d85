//! Object key helpers
//!
//! The object store namespace is flat; directories are simulated with `/`
//! separated key prefixes.

/// Separator used inside object keys
pub const SEPARATOR: char = '/';

/// Object keys never start with a separator.
pub fn object_key(path: &str) -> &str {
    path.trim_start_matches(SEPARATOR)
}

/// Normalize a logical directory into a listing prefix.
///
/// Leading separators are stripped and the result ends with exactly one
/// separator, so `db` never matches keys under `db2/`. An empty path stays
/// empty (the whole bucket).
pub fn normalize_prefix(path: &str) -> String {
    let trimmed = object_key(path).trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return String::new();
    }
    let mut prefix = String::with_capacity(trimmed.len() + 1);
    prefix.push_str(trimmed);
    prefix.push(SEPARATOR);
    prefix
}

/// Join a normalized prefix and a listed suffix back into a full key.
pub fn join_key(prefix: &str, suffix: &str) -> String {
    format!("{}{}", prefix, suffix)
}

/// Suffix of `key` below `prefix`, or `None` if the key lies outside it.
pub fn strip_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)
}
