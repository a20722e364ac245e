//! Bundle processor facade.
//!
//! [`BundleProcessor`] is the entry point for callers: it dispatches a
//! bundle on its declared type, keeps statistics, and renders failures as
//! OperationOutcome documents.

use crate::batch::BatchProcessor;
use crate::bundle::{Bundle, BundleResponse, BundleType};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::outcome::OperationOutcome;
use crate::stats::ProcessorStats;
use crate::transaction::{RequestContext, TransactionCoordinator};
use clinitx_storage::ResourceStore;
use serde_json::Value;
use std::sync::Arc;

/// Processes transaction and batch bundles against one store.
///
/// # Example
///
/// ```rust
/// use clinitx_core::{Bundle, BundleEntry, BundleProcessor, Config, RequestContext};
/// use clinitx_storage::InMemoryStore;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let processor = BundleProcessor::new(Arc::new(InMemoryStore::new()), Config::default());
/// let bundle = Bundle::transaction(vec![
///     BundleEntry::create("urn:uuid:p1", json!({"resourceType": "Patient"})),
///     BundleEntry::create(
///         "urn:uuid:o1",
///         json!({"resourceType": "Observation", "subject": {"reference": "urn:uuid:p1"}}),
///     ),
/// ]);
///
/// let response = processor.process(&bundle, &RequestContext::new()).unwrap();
/// let subject = &response.entries[1].resource.as_ref().unwrap()["subject"]["reference"];
/// assert!(subject.as_str().unwrap().ends_with("/_history/1"));
/// ```
pub struct BundleProcessor {
    coordinator: TransactionCoordinator,
    batch: BatchProcessor,
    config: Config,
    stats: ProcessorStats,
}

impl BundleProcessor {
    /// Creates a processor over `store`.
    pub fn new(store: Arc<dyn ResourceStore>, config: Config) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(Arc::clone(&store), config.clone()),
            batch: BatchProcessor::new(store, config.clone()),
            config,
            stats: ProcessorStats::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        self.coordinator.store()
    }

    /// Returns processing statistics.
    #[must_use]
    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    /// Processes a bundle according to its type.
    ///
    /// # Errors
    ///
    /// Returns the coordinator's error for a failed transaction, and
    /// [`CoreError::InvalidBundle`] for bundle types that are not
    /// processed (or a batch when batches are disabled).
    pub fn process(&self, bundle: &Bundle, ctx: &RequestContext) -> CoreResult<BundleResponse> {
        match bundle.bundle_type {
            BundleType::Transaction => {
                let result = self.coordinator.execute(bundle, ctx);
                match &result {
                    Ok(response) => self.stats.record_commit(response.entries.len()),
                    Err(
                        CoreError::UnsupportedOperation { .. } | CoreError::InvalidBundle { .. },
                    ) => self.stats.record_rejection(),
                    Err(_) => self.stats.record_abort(),
                }
                result
            }
            BundleType::Batch if self.config.allow_batch => {
                let response = self.batch.execute(bundle, ctx)?;
                let failed = response
                    .entries
                    .iter()
                    .filter(|e| e.response.outcome.is_some())
                    .count();
                self.stats
                    .record_batch(response.entries.len() - failed, failed);
                Ok(response)
            }
            BundleType::Batch => Err(CoreError::invalid_bundle(
                "batch bundles are disabled",
            )),
            other => Err(CoreError::invalid_bundle(format!(
                "bundle type {other} cannot be processed"
            ))),
        }
    }

    /// Parses a bundle from JSON text and processes it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] for unparseable text, otherwise as
    /// [`process`](Self::process).
    pub fn process_json(&self, text: &str, ctx: &RequestContext) -> CoreResult<BundleResponse> {
        let bundle = Bundle::from_json(text)?;
        self.process(&bundle, ctx)
    }

    /// Processes a bundle and renders the result as an HTTP status and a
    /// JSON body: the response bundle on success, an OperationOutcome on
    /// failure.
    #[must_use]
    pub fn respond(&self, bundle: &Bundle, ctx: &RequestContext) -> (u16, Value) {
        match self.process(bundle, ctx).and_then(|r| r.to_value()) {
            Ok(body) => (200, body),
            Err(err) => (err.status_code(), OperationOutcome::from_error(&err).to_value()),
        }
    }
}

impl std::fmt::Debug for BundleProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleProcessor")
            .field("coordinator", &self.coordinator)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
