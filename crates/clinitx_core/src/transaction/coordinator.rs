//! Transaction coordinator.

use crate::bundle::{Bundle, BundleResponse, BundleType, EntryResponse};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::reference::{rewrite_references, ReferenceIndex};
use crate::transaction::context::RequestContext;
use crate::transaction::scope::TransactionScope;
use clinitx_storage::{PersistOp, ResourceStore, StoredResource};
use std::sync::Arc;

/// Phases a transaction bundle moves through.
///
/// `Received -> CapabilityChecked -> {Rejected | Executing} -> {Committed | Aborted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// The bundle has arrived.
    Received,
    /// The store's capability has been queried.
    CapabilityChecked,
    /// The store cannot run atomic transactions; nothing was touched.
    Rejected,
    /// An atomic scope is open and entries are being written.
    Executing,
    /// Every entry was written and the scope committed.
    Committed,
    /// An entry or the scope failed; every write was rolled back.
    Aborted,
}

/// Executes transaction bundles as one atomic unit.
///
/// The coordinator:
/// - Rejects the bundle up front if the store has no atomic transactions
/// - Writes entries strictly in bundle order inside one atomic scope
/// - Resolves placeholder references to entries written earlier in the
///   bundle, using a [`ReferenceIndex`] private to this call
/// - Commits only if every entry succeeded, otherwise rolls back
///
/// A reference to a placeholder declared by a *later* entry is not
/// resolved; it is left as written, like any external reference.
///
/// Separate calls are independent and may run concurrently; isolation
/// between them is the store's responsibility.
pub struct TransactionCoordinator {
    store: Arc<dyn ResourceStore>,
    config: Config,
}

impl TransactionCoordinator {
    /// Creates a coordinator over `store`.
    pub fn new(store: Arc<dyn ResourceStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executes a transaction bundle.
    ///
    /// On success the response holds one entry per request entry, in
    /// request order, each carrying the permanent identifier, the
    /// version-qualified location, and the body as stored.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnsupportedOperation`] if the store lacks atomic
    ///   transactions; no store call is made
    /// - [`CoreError::InvalidBundle`] if the bundle is not a transaction, is
    ///   too large, or has an entry that cannot be mapped to a write; no
    ///   store call is made
    /// - [`CoreError::EntryPersistence`], [`CoreError::DuplicatePlaceholder`],
    ///   [`CoreError::Cancelled`], [`CoreError::TimedOut`] or
    ///   [`CoreError::Scope`] after the scope was opened; nothing written by
    ///   this call is visible afterwards
    pub fn execute(&self, bundle: &Bundle, ctx: &RequestContext) -> CoreResult<BundleResponse> {
        let mut phase = TransactionPhase::Received;
        tracing::debug!(entries = bundle.len(), ?phase, "transaction received");

        let supported = self.store.supports_atomic_transactions();
        phase = TransactionPhase::CapabilityChecked;
        tracing::trace!(supported, ?phase, "capability checked");
        if !supported {
            phase = TransactionPhase::Rejected;
            tracing::warn!(
                backend = self.store.backend_name(),
                ?phase,
                "transaction rejected: store has no atomic transactions"
            );
            return Err(CoreError::UnsupportedOperation {
                backend: self.store.backend_name(),
            });
        }

        let ops = self.prepare(bundle)?;
        let ctx = ctx.or_timeout(self.config.transaction_timeout);

        let mut scope = TransactionScope::begin(self.store.as_ref())?;
        phase = TransactionPhase::Executing;
        tracing::debug!(?phase, "atomic scope opened");

        let written = match self.apply(&mut scope, bundle, ops, &ctx) {
            Ok(written) => written,
            Err(err) => {
                phase = TransactionPhase::Aborted;
                tracing::warn!(error = %err, ?phase, "transaction aborted");
                if let Err(rollback_err) = scope.rollback() {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
        };

        if let Err(err) = scope.commit() {
            phase = TransactionPhase::Aborted;
            tracing::warn!(error = %err, ?phase, "transaction commit failed");
            return Err(err);
        }
        phase = TransactionPhase::Committed;
        tracing::info!(entries = written.len(), ?phase, "transaction committed");

        let base_url = self.config.base_url.as_deref();
        let entries = written
            .into_iter()
            .map(|stored| EntryResponse::written(stored, base_url))
            .collect();
        Ok(BundleResponse::new(BundleType::TransactionResponse, entries))
    }

    /// Validates the bundle and derives one store operation per entry,
    /// without touching the store.
    fn prepare(&self, bundle: &Bundle) -> CoreResult<Vec<PersistOp>> {
        if bundle.bundle_type != BundleType::Transaction {
            return Err(CoreError::invalid_bundle(format!(
                "expected a transaction bundle, got {}",
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
        bundle
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.operation().map_err(|err| match err {
                    CoreError::InvalidBundle { message } => {
                        CoreError::invalid_bundle(format!("entry {index}: {message}"))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Writes every entry in order inside `scope`.
    fn apply(
        &self,
        scope: &mut TransactionScope<'_>,
        bundle: &Bundle,
        ops: Vec<PersistOp>,
        ctx: &RequestContext,
    ) -> CoreResult<Vec<StoredResource>> {
        let mut index = ReferenceIndex::new();
        let mut written = Vec::with_capacity(ops.len());

        for (i, (entry, op)) in bundle.entries.iter().zip(ops).enumerate() {
            ctx.check(i)?;

            let rewritten = rewrite_references(&entry.resource, &index);
            for reference in &rewritten.references {
                tracing::debug!(
                    index = i,
                    pointer = %reference.pointer,
                    from = %reference.from,
                    to = %reference.to,
                    "reference resolved"
                );
            }

            let stored = scope
                .persist(&op, rewritten.body)
                .map_err(|err| CoreError::entry(i, entry.full_url.as_deref(), err))?;
            tracing::debug!(
                index = i,
                full_url = entry.full_url.as_deref().unwrap_or(""),
                location = %stored.versioned_reference(),
                "entry written"
            );

            if let Some(placeholder) = entry.full_url.as_deref() {
                index.record_written(placeholder, i, &stored)?;
            }
            written.push(stored);
        }

        ctx.check(written.len())?;
        Ok(written)
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}
