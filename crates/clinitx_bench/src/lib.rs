//! Benchmark utilities.

#![warn(missing_docs)]

use clinitx_core::{Bundle, BundleEntry, ReferenceIndex};
use clinitx_storage::{ResourceKey, VersionId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

/// Shape of the reference graph in a generated bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// No entry references another.
    None,
    /// Every entry after the first references its predecessor.
    Chain,
    /// Every entry references a randomly chosen earlier entry.
    Random,
}

/// Placeholder of the i-th generated entry.
pub fn placeholder(i: usize) -> String {
    format!("urn:uuid:bench-{i}")
}

/// Generate a transaction bundle of `count` creates.
pub fn generate_bundle(count: usize, linkage: Linkage) -> Bundle {
    let mut rng = rand::thread_rng();
    let entries = (0..count)
        .map(|i| {
            let mut body = json!({
                "resourceType": "Observation",
                "status": "final",
                "valueQuantity": {"value": rng.gen_range(40.0..180.0), "unit": "bpm"}
            });
            let target = match linkage {
                Linkage::None => None,
                _ if i == 0 => None,
                Linkage::Chain => Some(i - 1),
                Linkage::Random => Some(rng.gen_range(0..i)),
            };
            if let Some(j) = target {
                body["focus"] = json!([{"reference": placeholder(j)}]);
            }
            BundleEntry::create(placeholder(i), body)
        })
        .collect();
    Bundle::transaction(entries)
}

/// Generate a resource body with `references` reference members spread
/// over nested arrays, pointing at placeholders `0..pool`.
pub fn generate_body(references: usize, pool: usize) -> Value {
    let mut rng = rand::thread_rng();
    let mut items: Vec<Value> = (0..references)
        .map(|_| {
            json!({
                "reference": placeholder(rng.gen_range(0..pool.max(1))),
                "display": "bench"
            })
        })
        .collect();
    items.shuffle(&mut rng);
    json!({
        "resourceType": "CarePlan",
        "activity": items.chunks(4).map(|c| json!({"detail": {"performer": c}})).collect::<Vec<_>>()
    })
}

/// Build an index resolving placeholders `0..count`.
pub fn generate_index(count: usize) -> ReferenceIndex {
    let mut index = ReferenceIndex::new();
    for i in 0..count {
        // Placeholders are distinct, so recording cannot fail.
        let _ = index.record(
            &placeholder(i),
            i,
            ResourceKey::generate("Patient"),
            VersionId::INITIAL,
        );
    }
    index
}
