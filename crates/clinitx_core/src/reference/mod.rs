//! Intra-bundle reference resolution.
//!
//! Entries in a bundle refer to each other through client-chosen
//! placeholders (their `fullUrl`). As entries are persisted, the
//! [`ReferenceIndex`] learns the permanent identity minted for each
//! placeholder, and the rewriter substitutes the version-qualified form
//! `<Type>/<id>/_history/<n>` into later entries.

mod index;
mod rewrite;

pub use index::{ReferenceIndex, ResolvedTarget};
pub use rewrite::{
    rewrite_in_place, rewrite_references, Rewritten, RewrittenReference, REFERENCE_FIELD,
};
