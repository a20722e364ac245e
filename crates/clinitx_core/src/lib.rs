//! # clinitx Core
//!
//! Atomic processing of FHIR-style transaction bundles.
//!
//! This crate provides:
//! - The bundle data model and its JSON wire shape
//! - Placeholder reference resolution and rewriting
//! - A transaction coordinator that applies a bundle all-or-nothing on
//!   stores with atomic transactions, and rejects it on stores without
//! - Batch processing for independent entries
//! - OperationOutcome rendering of failures

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod bundle;
mod config;
mod error;
mod outcome;
mod processor;
mod reference;
mod stats;
mod transaction;

pub use batch::BatchProcessor;
pub use bundle::{
    weak_etag, Bundle, BundleEntry, BundleResponse, BundleType, EntryOutcome, EntryRequest,
    EntryResponse, Method,
};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use outcome::{Issue, IssueCode, IssueSeverity, OperationOutcome};
pub use processor::BundleProcessor;
pub use reference::{
    rewrite_in_place, rewrite_references, ReferenceIndex, ResolvedTarget, Rewritten,
    RewrittenReference, REFERENCE_FIELD,
};
pub use stats::{ProcessorStats, StatsSnapshot};
pub use transaction::{
    CancellationToken, RequestContext, ScopeState, TransactionCoordinator, TransactionPhase,
    TransactionScope,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
