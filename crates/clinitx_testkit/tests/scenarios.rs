//! End-to-end bundle scenarios.

use clinitx_core::{
    Bundle, BundleEntry, BundleType, CancellationToken, Config, CoreError, OperationOutcome,
    RequestContext,
};
use clinitx_storage::{InMemoryStore, ResourceKey, ResourceStore};
use clinitx_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[test]
fn store_without_transactions_rejects_with_method_not_allowed() {
    let (store, processor) = partitioned_processor();

    let (status, body) = processor.respond(&patient_observation_bundle(), &RequestContext::new());

    assert_eq!(status, 405);
    assert_eq!(body["resourceType"], "OperationOutcome");
    assert_eq!(body["issue"][0]["code"], "not-supported");
    assert!(store.is_empty());
}

#[test]
fn observation_references_patient_version() {
    let (store, processor) = memory_processor();

    let response = processor
        .process(&patient_observation_bundle(), &RequestContext::new())
        .unwrap();

    assert_eq!(response.bundle_type, BundleType::TransactionResponse);
    let patient = &response.entries[0];
    assert_eq!(patient.response.status, "201 Created");
    let patient_id = patient.full_url.as_deref().unwrap();
    assert_eq!(
        subject_reference(&response, 1),
        Some(format!("{patient_id}/_history/1").as_str())
    );
    assert_eq!(store.len(), 2);
}

#[test]
fn json_request_round_trip() {
    let (_, processor) = memory_processor();

    let response = processor
        .process_json(&patient_observation_json().to_string(), &RequestContext::new())
        .unwrap();
    let value = response.to_value().unwrap();

    assert_eq!(value["resourceType"], "Bundle");
    assert_eq!(value["type"], "transaction-response");
    let reference = value["entry"][1]["resource"]["subject"]["reference"]
        .as_str()
        .unwrap();
    assert_eq!(
        reference,
        format!("{}/_history/1", value["entry"][0]["fullUrl"].as_str().unwrap())
    );
    assert_eq!(value["entry"][0]["response"]["etag"], "W/\"1\"");
}

#[test]
fn client_version_suffix_is_replaced() {
    let (_, processor) = memory_processor();

    let response = processor
        .process(&versioned_reference_bundle(), &RequestContext::new())
        .unwrap();

    let patient_id = response.entries[0].full_url.as_deref().unwrap();
    assert_eq!(
        subject_reference(&response, 1),
        Some(format!("{patient_id}/_history/1").as_str())
    );
}

#[test]
fn external_references_are_untouched() {
    let (_, processor) = memory_processor();
    let bundle = Bundle::transaction(vec![observation_entry("urn:o1", "Patient/already-there")]);

    let response = processor.process(&bundle, &RequestContext::new()).unwrap();

    assert_eq!(subject_reference(&response, 0), Some("Patient/already-there"));
}

#[test]
fn failure_after_several_writes_leaves_store_empty() {
    let (store, processor) = memory_processor();
    let bundle = Bundle::transaction(vec![
        patient_entry("urn:p1"),
        observation_entry("urn:o1", "urn:p1"),
        patient_entry("urn:p2"),
        rejected_entry("urn:bad"),
    ]);

    let (status, body) = processor.respond(&bundle, &RequestContext::new());

    assert_eq!(status, 422);
    assert_eq!(body["issue"][0]["expression"][0], "Bundle.entry[3]");
    assert!(store.is_empty());
    assert_eq!(processor.stats().snapshot().transactions_aborted, 1);
}

#[test]
fn commit_failure_leaves_store_empty() {
    let store = Arc::new(InstrumentedStore::new(InMemoryStore::new()).fail_on_commit());
    let coordinator = coordinator_for(store.clone());

    let err = coordinator
        .execute(&patient_observation_bundle(), &RequestContext::new())
        .unwrap_err();

    assert!(matches!(err, CoreError::Scope { .. }));
    assert_eq!(err.status_code(), 500);
    assert!(err.to_string().contains(INJECTED_FAILURE));
    let counts = store.counts();
    assert_eq!(counts.persists, 2);
    assert_eq!(counts.commits, 1);
    assert!(store.inner().is_empty());
}

#[test]
fn capability_is_queried_once_per_transaction() {
    let store = Arc::new(InstrumentedStore::new(InMemoryStore::new()));
    let coordinator = coordinator_for(store.clone());

    coordinator
        .execute(&patient_observation_bundle(), &RequestContext::new())
        .unwrap();

    assert_eq!(store.capability_queries(), 1);
    assert_eq!(store.counts().begins, 1);
    assert_eq!(store.counts().commits, 1);
    assert_eq!(store.inner().len(), 2);
}

#[test]
fn update_then_reference_uses_updated_version() {
    let store = Arc::new(InMemoryStore::new());
    let key = ResourceKey::new("Patient", "p-42");
    let seed = Bundle::transaction(vec![BundleEntry::update(
        "urn:seed",
        &key,
        json!({"resourceType": "Patient"}),
    )]);
    let processor = clinitx_core::BundleProcessor::new(store.clone(), Config::default());
    processor.process(&seed, &RequestContext::new()).unwrap();

    let bundle = Bundle::transaction(vec![
        BundleEntry::update("urn:p", &key, json!({"resourceType": "Patient", "active": true})),
        observation_entry("urn:o", "urn:p"),
    ]);
    let response = processor.process(&bundle, &RequestContext::new()).unwrap();

    assert_eq!(subject_reference(&response, 1), Some("Patient/p-42/_history/2"));
    assert_eq!(response.entries[0].response.etag.as_deref(), Some("W/\"2\""));
}

#[test]
fn cancelled_request_commits_nothing() {
    let (store, processor) = memory_processor();
    let token = CancellationToken::new();
    token.cancel();

    let result = processor.process(
        &independent_patients(5),
        &RequestContext::new().with_token(token),
    );

    let err = result.unwrap_err();
    assert!(matches!(err, CoreError::Cancelled { .. }));
    assert_eq!(err.status_code(), 499);
    assert_eq!(
        OperationOutcome::from_error(&err).to_value()["issue"][0]["code"],
        "incomplete"
    );
    assert!(store.is_empty());
}

#[test]
fn batch_on_non_transactional_store_applies_what_it_can() {
    let (store, processor) = partitioned_processor();
    let bundle = Bundle::batch(vec![
        patient_entry("urn:p1"),
        rejected_entry("urn:bad"),
        patient_entry("urn:p2"),
    ]);

    let response = processor.process(&bundle, &RequestContext::new()).unwrap();

    let statuses: Vec<_> = response
        .entries
        .iter()
        .map(|e| e.status_code())
        .collect();
    assert_eq!(statuses, vec![Some(201), Some(422), Some(201)]);
    assert_eq!(store.len(), 2);
}
