//! Property-based test generators using proptest.
//!
//! Provides strategies for generating bundles and resource bodies whose
//! placeholders and references have a known shape.

use clinitx_core::{Bundle, BundleEntry};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Resource types used by the generators.
pub const RESOURCE_TYPES: &[&str] = &["Patient", "Observation", "Encounter", "Condition"];

/// Strategy for generating placeholder ids in `urn:uuid:` form.
pub fn placeholder_strategy() -> impl Strategy<Value = String> {
    "[0-9a-f]{8}".prop_map(|hex| format!("urn:uuid:{hex}"))
}

/// Strategy for generating a resource type.
pub fn resource_type_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(RESOURCE_TYPES)
}

/// A generated transaction bundle together with its reference graph.
#[derive(Debug, Clone)]
pub struct LinkedBundle {
    /// The bundle; every entry is a create with a unique placeholder.
    pub bundle: Bundle,
    /// For each entry, the earlier entry its `subject` refers to, if any.
    pub links: Vec<Option<usize>>,
}

/// Strategy for bundles of 1 to `max_entries` creates where each entry may
/// reference one earlier entry through `subject.reference`.
pub fn linked_bundle_strategy(max_entries: usize) -> impl Strategy<Value = LinkedBundle> {
    prop::collection::vec(
        (resource_type_strategy(), any::<prop::sample::Index>(), any::<bool>()),
        1..=max_entries.max(1),
    )
    .prop_map(|specs| {
        let mut entries = Vec::with_capacity(specs.len());
        let mut links = Vec::with_capacity(specs.len());
        for (i, (resource_type, target, linked)) in specs.into_iter().enumerate() {
            let link = (linked && i > 0).then(|| target.index(i));
            let mut body = json!({"resourceType": resource_type});
            if let Some(j) = link {
                body["subject"] = json!({"reference": format!("urn:uuid:entry-{j}")});
            }
            entries.push(BundleEntry::create(format!("urn:uuid:entry-{i}"), body));
            links.push(link);
        }
        LinkedBundle {
            bundle: Bundle::transaction(entries),
            links,
        }
    })
}

/// Strategy for arbitrary nested resource bodies whose `reference` members
/// are drawn from `references`.
pub fn resource_body_strategy(references: Vec<String>) -> impl Strategy<Value = Value> {
    let reference = prop::sample::select(references).prop_map(|r| json!({"reference": r}));
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
        reference,
    ];
    let tree = leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z~/]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    });
    (resource_type_strategy(), tree).prop_map(|(resource_type, content)| {
        json!({"resourceType": resource_type, "content": content})
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn links_point_backwards(linked in linked_bundle_strategy(8)) {
            prop_assert_eq!(linked.links.len(), linked.bundle.len());
            for (i, link) in linked.links.iter().enumerate() {
                if let Some(j) = link {
                    prop_assert!(*j < i);
                }
            }
        }

        #[test]
        fn bodies_are_objects(body in resource_body_strategy(vec!["urn:uuid:x".into()])) {
            prop_assert!(body.is_object());
            prop_assert!(body["resourceType"].is_string());
        }
    }
}
