//! # clinitx Testkit
//!
//! Test utilities for clinitx.
//!
//! This crate provides:
//! - Bundle fixtures and processor helpers
//! - Instrumented stores that count calls and inject write failures
//! - Property-based test generators using proptest
//! - Multi-threaded stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use clinitx_testkit::prelude::*;
//! use clinitx_core::RequestContext;
//!
//! let (store, processor) = memory_processor();
//! processor
//!     .process(&patient_observation_bundle(), &RequestContext::new())
//!     .unwrap();
//! # use clinitx_storage::ResourceStore;
//! assert_eq!(store.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
