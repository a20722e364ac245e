//! Concurrent transactions over one shared store.

use clinitx_core::{BundleProcessor, Config, RequestContext};
use clinitx_storage::{InMemoryStore, ResourceStore};
use clinitx_testkit::prelude::*;
use std::sync::Arc;
use std::thread;

#[test]
fn independent_transactions_all_commit() {
    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(BundleProcessor::new(store.clone(), Config::default()));
    let config = StressConfig {
        operations: 25,
        threads: 4,
        pairs_per_bundle: 2,
        shared_keys: 1,
    };

    let result = stress_concurrent_transactions(processor.clone(), &config);

    assert_eq!(result.total_ops, 100);
    assert_eq!(result.successful_ops, 100);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(store.len(), 100 * 4);
    assert_eq!(processor.stats().snapshot().transactions_committed, 100);
}

#[test]
fn every_committed_observation_points_at_its_own_patient() {
    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(BundleProcessor::new(store, Config::default()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let processor = Arc::clone(&processor);
            thread::spawn(move || {
                (0..20)
                    .map(|_| {
                        processor
                            .process(&linked_pairs_bundle(3), &RequestContext::new())
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for response in handle.join().unwrap() {
            for pair in 0..3 {
                let patient = response.entries[pair * 2]
                    .response
                    .location
                    .as_deref()
                    .unwrap();
                assert_eq!(subject_reference(&response, pair * 2 + 1), Some(patient));
            }
        }
    }
}

#[test]
fn contended_updates_lose_nothing_silently() {
    let store = Arc::new(InMemoryStore::new());
    let processor = Arc::new(BundleProcessor::new(store.clone(), Config::default()));
    let config = StressConfig {
        operations: 50,
        threads: 4,
        pairs_per_bundle: 0,
        shared_keys: 2,
    };

    let result = stress_contended_updates(processor.clone(), &config);

    assert_eq!(result.total_ops, 200);
    assert_eq!(result.failed_ops, result.conflicts);
    assert_eq!(store.len(), 2);

    // Every committed update bumped exactly one version.
    let versions: u64 = store
        .snapshot()
        .iter()
        .map(|resource| resource.version.as_u64())
        .sum();
    assert_eq!(versions as usize, result.successful_ops);
}
