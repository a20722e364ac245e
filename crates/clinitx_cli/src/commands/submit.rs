//! Submit command implementation.

use super::{read_file, CliError, Format};
use clap::ValueEnum;
use clinitx_core::{BundleProcessor, Config, OperationOutcome, RequestContext};
use clinitx_storage::{InMemoryStore, PartitionedStore, ResourceStore};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Store backend to process against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// In-memory store with atomic transactions.
    #[default]
    Memory,
    /// Partitioned store without atomic transactions.
    Partitioned,
}

/// Options for the submit command.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Store backend.
    pub backend: Backend,
    /// Base URL for response `fullUrl`s.
    pub base_url: Option<String>,
    /// Whether an update of a missing resource creates it.
    pub update_creates: bool,
    /// Transaction timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            base_url: None,
            update_creates: true,
            timeout_ms: None,
        }
    }
}

fn open_store(options: &SubmitOptions) -> Arc<dyn ResourceStore> {
    match options.backend {
        Backend::Memory => {
            Arc::new(InMemoryStore::new().with_update_creates(options.update_creates))
        }
        Backend::Partitioned => {
            Arc::new(PartitionedStore::new().with_update_creates(options.update_creates))
        }
    }
}

/// Processes bundle text and returns the HTTP status and JSON document
/// that a server would answer with.
pub fn execute(text: &str, options: &SubmitOptions) -> (u16, Value) {
    let mut config = Config::new();
    if let Some(base_url) = &options.base_url {
        config = config.base_url(base_url.clone());
    }
    if let Some(ms) = options.timeout_ms {
        config = config.transaction_timeout(Some(Duration::from_millis(ms)));
    }

    let store = open_store(options);
    tracing::debug!(backend = store.backend_name(), "store opened");
    let processor = BundleProcessor::new(store, config);

    match processor
        .process_json(text, &RequestContext::new())
        .and_then(|response| response.to_value())
    {
        Ok(body) => (200, body),
        Err(err) => {
            tracing::error!(error = %err, status = err.status_code(), "bundle rejected");
            (err.status_code(), OperationOutcome::from_error(&err).to_value())
        }
    }
}

/// Runs the submit command.
pub fn run(path: &Path, options: &SubmitOptions, format: Format) -> Result<(), CliError> {
    let text = read_file(path)?;
    let (status, body) = execute(&text, options);
    println!("{}", format.render(&body)?);
    if status == 200 {
        Ok(())
    } else {
        Err(CliError::BundleFailed { status })
    }
}
