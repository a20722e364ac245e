//! Batch bundle processing.
//!
//! A batch applies each entry on its own: a failing entry is reported in
//! its response slot and the rest carry on. No atomic scope is opened, so
//! batches work on any store, and placeholders are not resolved between
//! entries.

use crate::bundle::{Bundle, BundleResponse, BundleType, EntryResponse};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::outcome::{IssueCode, OperationOutcome};
use crate::transaction::RequestContext;
use clinitx_storage::ResourceStore;
use std::sync::Arc;

/// Status reported for entries skipped after the request was cancelled.
const CANCELLED_STATUS: u16 = 499;

/// Status reported for entries skipped after the deadline passed.
const TIMED_OUT_STATUS: u16 = 408;

/// Executes batch bundles entry by entry.
pub struct BatchProcessor {
    store: Arc<dyn ResourceStore>,
    config: Config,
}

impl BatchProcessor {
    /// Creates a batch processor over `store`.
    pub fn new(store: Arc<dyn ResourceStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Executes a batch bundle.
    ///
    /// Entries are applied in order with autocommitted writes. Once the
    /// request is cancelled or times out, the remaining entries are not
    /// attempted and report 499 or 408 respectively.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidBundle`] if the bundle is not a batch or
    /// exceeds the entry limit. Per-entry failures are not errors.
    pub fn execute(&self, bundle: &Bundle, ctx: &RequestContext) -> CoreResult<BundleResponse> {
        if bundle.bundle_type != BundleType::Batch {
            return Err(CoreError::invalid_bundle(format!(
                "expected a batch bundle, got {}",
                bundle.bundle_type
            )));
        }
        if bundle.len() > self.config.max_entries {
            return Err(CoreError::invalid_bundle(format!(
                "bundle has {} entries, limit is {}",
                bundle.len(),
                self.config.max_entries
            )));
        }

        let ctx = ctx.or_timeout(self.config.transaction_timeout);
        let base_url = self.config.base_url.as_deref();
        let mut entries = Vec::with_capacity(bundle.len());
        let mut interrupted: Option<CoreError> = None;

        for (i, entry) in bundle.entries.iter().enumerate() {
            if interrupted.is_none() {
                if let Err(err) = ctx.check(i) {
                    tracing::warn!(error = %err, "batch interrupted");
                    interrupted = Some(err);
                }
            }
            if let Some(err) = &interrupted {
                entries.push(skipped(i, err));
                continue;
            }

            let response = match entry.operation() {
                Ok(op) => match self.store.persist(&op, entry.resource.clone()) {
                    Ok(stored) => EntryResponse::written(stored, base_url),
                    Err(err) => {
                        tracing::debug!(index = i, error = %err, "batch entry failed");
                        EntryResponse::failed(
                            err.status_code(),
                            OperationOutcome::from_storage_error(&err)
                                .at_entry(i)
                                .to_value(),
                        )
                    }
                },
                Err(err) => EntryResponse::failed(
                    err.status_code(),
                    OperationOutcome::from_error(&err).at_entry(i).to_value(),
                ),
            };
            entries.push(response);
        }

        let failed = entries
            .iter()
            .filter(|e| e.response.outcome.is_some())
            .count();
        tracing::info!(
            entries = entries.len(),
            failed,
            "batch processed"
        );
        Ok(BundleResponse::new(BundleType::BatchResponse, entries))
    }
}

fn skipped(index: usize, cause: &CoreError) -> EntryResponse {
    let (status, code) = match cause {
        CoreError::TimedOut { .. } => (TIMED_OUT_STATUS, IssueCode::Timeout),
        _ => (CANCELLED_STATUS, IssueCode::Incomplete),
    };
    EntryResponse::failed(
        status,
        OperationOutcome::error(code, format!("entry not processed: {cause}"))
            .at_entry(index)
            .to_value(),
    )
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}
