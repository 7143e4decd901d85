//! Directory simulation over the flat key namespace
//!
//! ## Pagination
//! Pages of at most [`LIST_PAGE_SIZE`] keys are requested until the store
//! reports a page that is not truncated. The next page starts at the
//! store's `next_marker`, or at the last key of the current page when the
//! store omits it or sends an empty one. The marker is opaque, so the only
//! loop guard is that it must change between pages. The last-key fallback
//! relies on listings coming back in lexicographic key order.

use crate::client::ListRequest;
use crate::error::{CloudError, Result};
use crate::paths::{join_key, normalize_prefix, strip_prefix};

use super::StorageProvider;

/// Keys requested per listing page
pub const LIST_PAGE_SIZE: usize = 50;

impl StorageProvider {
    /// List every object under `prefix`, returning suffixes relative to it.
    ///
    /// A missing bucket on the first page is reported as not found; failures
    /// on later pages are I/O failures. A key outside the prefix is a
    /// protocol violation.
    pub fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let prefix = normalize_prefix(prefix);
        let mut request = ListRequest {
            bucket: bucket.to_string(),
            prefix: prefix.clone(),
            marker: String::new(),
            max_keys: LIST_PAGE_SIZE,
        };
        let mut result = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = match self.client.list_objects(&request) {
                Ok(page) => page,
                Err(e) if pages == 0 => {
                    tracing::debug!(bucket, prefix = %prefix, error = %e, "listing failed");
                    return Err(CloudError::from_client(&prefix, e));
                }
                Err(e) => {
                    tracing::error!(bucket, prefix = %prefix, page = pages, error = %e, "listing failed");
                    return Err(CloudError::Remote {
                        path: prefix,
                        message: e.message,
                    });
                }
            };
            pages += 1;

            for key in &page.keys {
                let suffix = strip_prefix(key, &prefix).ok_or_else(|| {
                    tracing::error!(bucket, prefix = %prefix, key = %key, "listed key outside prefix");
                    CloudError::Protocol(format!(
                        "listed key {} does not start with prefix {}",
                        key, prefix
                    ))
                })?;
                result.push(suffix.to_string());
            }

            if !page.is_truncated {
                break;
            }

            let next = match page.next_marker.filter(|m| !m.is_empty()) {
                Some(marker) => marker,
                None => page.keys.last().cloned().ok_or_else(|| {
                    CloudError::Protocol(format!(
                        "truncated listing of {} returned no keys and no marker",
                        prefix
                    ))
                })?,
            };
            if next == request.marker {
                return Err(CloudError::Protocol(format!(
                    "listing of {} did not advance past marker {}",
                    prefix, request.marker
                )));
            }
            request.marker = next;
        }

        tracing::debug!(bucket, prefix = %prefix, pages, objects = result.len(), "listed objects");
        Ok(result)
    }

    /// Delete every object under `prefix`.
    ///
    /// Failed deletions are logged and the remaining objects are still
    /// deleted; the call then fails with the number of failures.
    pub fn empty_bucket(&self, bucket: &str, prefix: &str) -> Result<()> {
        let suffixes = self.list_objects(bucket, prefix)?;
        let prefix = normalize_prefix(prefix);
        let total = suffixes.len();
        let mut failed = 0usize;

        for suffix in &suffixes {
            let key = join_key(&prefix, suffix);
            if let Err(e) = self.delete_object(bucket, &key) {
                tracing::error!(bucket, key = %key, error = %e, "unable to delete object");
                failed += 1;
            }
        }

        tracing::info!(bucket, prefix = %prefix, total, failed, "emptied bucket");
        if failed > 0 {
            return Err(CloudError::BulkDelete {
                bucket: bucket.to_string(),
                failed,
                total,
            });
        }
        Ok(())
    }
}
