//! Per-transaction placeholder index.

use crate::error::{CoreError, CoreResult};
use clinitx_storage::{ResourceKey, StoredResource, VersionId, HISTORY_SEGMENT};
use std::collections::HashMap;

/// Where a placeholder resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Permanent identifier assigned by the store.
    pub key: ResourceKey,
    /// Version assigned by the write in this transaction.
    pub version: VersionId,
    /// Entry that declared the placeholder.
    pub entry_index: usize,
    /// Whether the entry created the resource.
    pub created: bool,
}

impl ResolvedTarget {
    /// Renders the version-qualified reference `<Type>/<id>/_history/<n>`.
    #[must_use]
    pub fn versioned_reference(&self) -> String {
        self.key.versioned(self.version)
    }
}

/// Maps bundle placeholders to the identities minted for them.
///
/// An index lives for exactly one transaction. It is filled in entry order,
/// so a lookup only ever sees entries processed before the current one.
#[derive(Debug, Default, Clone)]
pub struct ReferenceIndex {
    targets: HashMap<String, ResolvedTarget>,
}

impl ReferenceIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the identity minted for a created resource declared by
    /// `placeholder`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicatePlaceholder`] if the placeholder was
    /// already recorded in this transaction. The index is left unchanged.
    pub fn record(
        &mut self,
        placeholder: &str,
        entry_index: usize,
        key: ResourceKey,
        version: VersionId,
    ) -> CoreResult<()> {
        self.insert(
            placeholder,
            ResolvedTarget {
                key,
                version,
                entry_index,
                created: true,
            },
        )
    }

    /// Records the outcome of the write made for the entry declaring
    /// `placeholder`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicatePlaceholder`] if the placeholder was
    /// already recorded in this transaction.
    pub fn record_written(
        &mut self,
        placeholder: &str,
        entry_index: usize,
        stored: &StoredResource,
    ) -> CoreResult<()> {
        self.insert(
            placeholder,
            ResolvedTarget {
                key: stored.key.clone(),
                version: stored.version,
                entry_index,
                created: stored.created,
            },
        )
    }

    fn insert(&mut self, placeholder: &str, target: ResolvedTarget) -> CoreResult<()> {
        if let Some(existing) = self.targets.get(placeholder) {
            return Err(CoreError::DuplicatePlaceholder {
                placeholder: placeholder.to_string(),
                first_index: existing.entry_index,
                index: target.entry_index,
            });
        }
        self.targets.insert(placeholder.to_string(), target);
        Ok(())
    }

    /// Looks up a placeholder. Absence means the candidate is not an
    /// in-bundle reference.
    #[must_use]
    pub fn lookup(&self, candidate: &str) -> Option<&ResolvedTarget> {
        self.targets.get(candidate)
    }

    /// Resolves a reference value to its version-qualified permanent form.
    ///
    /// Matches either a placeholder exactly, or the placeholder of a
    /// created resource followed by a `/_history/<n>` suffix. In the second
    /// case the client's version is replaced by the version assigned in
    /// this transaction. A version-pinned reference to an updated resource
    /// names an existing version and is left alone.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<String> {
        if let Some(target) = self.lookup(reference) {
            return Some(target.versioned_reference());
        }

        let (base, version) = reference.rsplit_once(HISTORY_SEGMENT)?;
        if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.lookup(base)
            .filter(|target| target.created)
            .map(ResolvedTarget::versioned_reference)
    }

    /// Returns the number of recorded placeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
