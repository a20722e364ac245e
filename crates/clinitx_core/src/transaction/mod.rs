//! Atomic execution of transaction bundles.
//!
//! A transaction bundle is all-or-nothing:
//! - **Gated**: stores without atomic transactions are rejected up front
//! - **Ordered**: entries are written in bundle order
//! - **Atomic**: one failure rolls back every write in the bundle
//! - **Interruptible**: cancellation and deadlines abort and roll back

mod context;
mod coordinator;
mod scope;

pub use context::{CancellationToken, RequestContext};
pub use coordinator::{TransactionCoordinator, TransactionPhase};
pub use scope::{ScopeState, TransactionScope};
