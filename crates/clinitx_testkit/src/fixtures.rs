//! Test fixtures and processor helpers.
//!
//! Provides ready-made entries and bundles for common scenarios, and
//! convenience constructors for processors over fresh stores.

use clinitx_core::{Bundle, BundleEntry, BundleProcessor, Config, TransactionCoordinator};
use clinitx_storage::{InMemoryStore, PartitionedStore, ResourceStore};
use serde_json::{json, Value};
use std::sync::Arc;

/// A Patient create entry under `placeholder`.
pub fn patient_entry(placeholder: &str) -> BundleEntry {
    BundleEntry::create(
        placeholder,
        json!({
            "resourceType": "Patient",
            "name": [{"family": "Doe", "given": ["Jane"]}]
        }),
    )
}

/// An Observation create entry whose subject references `subject`.
pub fn observation_entry(placeholder: &str, subject: &str) -> BundleEntry {
    BundleEntry::create(
        placeholder,
        json!({
            "resourceType": "Observation",
            "status": "final",
            "code": {"text": "heart rate"},
            "subject": {"reference": subject}
        }),
    )
}

/// An entry the store rejects: its body's type differs from its URL's.
pub fn rejected_entry(placeholder: &str) -> BundleEntry {
    let mut entry = patient_entry(placeholder);
    entry.resource = json!({"resourceType": "Observation"});
    entry
}

/// `[Patient "urn:p1", Observation "urn:o1" -> "urn:p1"]`.
pub fn patient_observation_bundle() -> Bundle {
    Bundle::transaction(vec![
        patient_entry("urn:p1"),
        observation_entry("urn:o1", "urn:p1"),
    ])
}

/// Like [`patient_observation_bundle`], but the Observation already
/// carries a client-side version suffix on its reference.
pub fn versioned_reference_bundle() -> Bundle {
    Bundle::transaction(vec![
        patient_entry("urn:p1"),
        observation_entry("urn:o1", "urn:p1/_history/1"),
    ])
}

/// The same bundle as raw FHIR JSON.
pub fn patient_observation_json() -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "entry": [
            {
                "fullUrl": "urn:p1",
                "resource": {"resourceType": "Patient"},
                "request": {"method": "POST", "url": "Patient"}
            },
            {
                "fullUrl": "urn:o1",
                "resource": {
                    "resourceType": "Observation",
                    "status": "final",
                    "subject": {"reference": "urn:p1"}
                },
                "request": {"method": "POST", "url": "Observation"}
            }
        ]
    })
}

/// `count` independent Patient creates with placeholders `urn:p0..`.
pub fn independent_patients(count: usize) -> Bundle {
    Bundle::transaction(
        (0..count)
            .map(|i| patient_entry(&format!("urn:p{i}")))
            .collect(),
    )
}

/// A processor over a fresh transactional store.
pub fn memory_processor() -> (Arc<InMemoryStore>, BundleProcessor) {
    let store = Arc::new(InMemoryStore::new());
    let processor = BundleProcessor::new(store.clone(), Config::default());
    (store, processor)
}

/// A processor over a fresh store without atomic transactions.
pub fn partitioned_processor() -> (Arc<PartitionedStore>, BundleProcessor) {
    let store = Arc::new(PartitionedStore::new());
    let processor = BundleProcessor::new(store.clone(), Config::default());
    (store, processor)
}

/// A coordinator with default configuration over `store`.
pub fn coordinator_for<S: ResourceStore + 'static>(store: Arc<S>) -> TransactionCoordinator {
    TransactionCoordinator::new(store, Config::default())
}

/// Returns the `subject.reference` of a response entry's resource.
pub fn subject_reference(response: &clinitx_core::BundleResponse, index: usize) -> Option<&str> {
    response.entries.get(index)?.resource.as_ref()?["subject"]["reference"].as_str()
}
