//! Stress helpers for bundle processing.
//!
//! These drive many transactions against one shared processor, from one
//! or several threads.

use crate::fixtures::{observation_entry, patient_entry};
use clinitx_core::{Bundle, BundleEntry, BundleProcessor, CoreError, RequestContext};
use clinitx_storage::ResourceKey;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total transactions submitted.
    pub total_ops: usize,
    /// Transactions that committed.
    pub successful_ops: usize,
    /// Transactions that failed.
    pub failed_ops: usize,
    /// Failures caused by a concurrent commit winning the race.
    pub conflicts: usize,
    /// Total duration.
    pub duration: Duration,
    /// Transactions per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, conflicts: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            conflicts,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total transactions: {}", self.total_ops);
        println!("Committed: {}", self.successful_ops);
        println!("Failed: {} ({} conflicts)", self.failed_ops, self.conflicts);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} tx/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Transactions per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Patient/Observation pairs per transaction.
    pub pairs_per_bundle: usize,
    /// Number of distinct shared resources updated across threads.
    pub shared_keys: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 100,
            threads: 4,
            pairs_per_bundle: 3,
            shared_keys: 4,
        }
    }
}

/// Builds a bundle of linked Patient/Observation pairs.
pub fn linked_pairs_bundle(pairs: usize) -> Bundle {
    let mut entries = Vec::with_capacity(pairs * 2);
    for i in 0..pairs {
        let patient = format!("urn:uuid:patient-{i}");
        entries.push(patient_entry(&patient));
        entries.push(observation_entry(&format!("urn:uuid:obs-{i}"), &patient));
    }
    Bundle::transaction(entries)
}

/// Builds a bundle that updates one of `shared_keys` well-known Patients.
pub fn shared_update_bundle(slot: usize, shared_keys: usize) -> Bundle {
    let key = ResourceKey::new("Patient", format!("shared-{}", slot % shared_keys.max(1)));
    Bundle::transaction(vec![BundleEntry::update(
        "urn:uuid:shared",
        &key,
        json!({"resourceType": "Patient", "active": true}),
    )])
}

/// Submits linked-pair transactions from several threads at once.
pub fn stress_concurrent_transactions(
    processor: Arc<BundleProcessor>,
    config: &StressConfig,
) -> StressTestResult {
    run_threads(processor, config, |_, _, cfg| linked_pairs_bundle(cfg.pairs_per_bundle))
}

/// Submits transactions that contend on a few shared resources.
pub fn stress_contended_updates(
    processor: Arc<BundleProcessor>,
    config: &StressConfig,
) -> StressTestResult {
    run_threads(processor, config, |t, i, cfg| {
        shared_update_bundle(t + i, cfg.shared_keys)
    })
}

fn run_threads<F>(
    processor: Arc<BundleProcessor>,
    config: &StressConfig,
    make_bundle: F,
) -> StressTestResult
where
    F: Fn(usize, usize, &StressConfig) -> Bundle + Send + Sync + 'static,
{
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));
    let make_bundle = Arc::new(make_bundle);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let processor = Arc::clone(&processor);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let conflicts = Arc::clone(&conflicts);
            let make_bundle = Arc::clone(&make_bundle);
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..config.operations {
                    let bundle = make_bundle(t, i, &config);
                    match processor.process(&bundle, &RequestContext::new()) {
                        Ok(_) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            if err.is_retryable() && !matches!(err, CoreError::TimedOut { .. }) {
                                conflicts.fetch_add(1, Ordering::Relaxed);
                            }
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            failed.fetch_add(config.operations, Ordering::Relaxed);
        }
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        conflicts.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
