//! Placeholder reference rewriting.

use crate::reference::ReferenceIndex;
use serde_json::Value;

/// Name of the member that holds a reference inside a resource body.
pub const REFERENCE_FIELD: &str = "reference";

/// One reference replaced by the rewriter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenReference {
    /// JSON pointer to the rewritten member, e.g. `/subject/reference`.
    pub pointer: String,
    /// The placeholder value found.
    pub from: String,
    /// The version-qualified value written.
    pub to: String,
}

/// The result of rewriting a resource body.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewritten {
    /// The body with in-bundle references resolved.
    pub body: Value,
    /// Every replacement made, in document order.
    pub references: Vec<RewrittenReference>,
}

/// Returns a copy of `body` with every in-bundle reference resolved.
///
/// References that match nothing in `index` (external references, already
/// resolved ones, placeholders of entries not yet processed) are left as
/// they are. Rewriting an already rewritten body is a no-op.
///
/// ```rust
/// use clinitx_core::{rewrite_references, ReferenceIndex};
/// use clinitx_storage::{ResourceKey, VersionId};
/// use serde_json::json;
///
/// let mut index = ReferenceIndex::new();
/// index
///     .record("urn:uuid:p1", 0, ResourceKey::new("Patient", "abc"), VersionId::INITIAL)
///     .unwrap();
///
/// let body = json!({"resourceType": "Observation", "subject": {"reference": "urn:uuid:p1"}});
/// let out = rewrite_references(&body, &index);
/// assert_eq!(out.body["subject"]["reference"], "Patient/abc/_history/1");
/// ```
#[must_use]
pub fn rewrite_references(body: &Value, index: &ReferenceIndex) -> Rewritten {
    let mut body = body.clone();
    let references = rewrite_in_place(&mut body, index);
    Rewritten { body, references }
}

/// Resolves in-bundle references directly inside `body`.
///
/// Returns the replacements made.
pub fn rewrite_in_place(body: &mut Value, index: &ReferenceIndex) -> Vec<RewrittenReference> {
    let mut references = Vec::new();
    if index.is_empty() {
        return references;
    }
    let mut pointer = String::new();
    walk(body, index, &mut pointer, &mut references);
    references
}

fn walk(
    value: &mut Value,
    index: &ReferenceIndex,
    pointer: &mut String,
    out: &mut Vec<RewrittenReference>,
) {
    match value {
        Value::Object(map) => {
            for (name, child) in map.iter_mut() {
                let len = pointer.len();
                pointer.push('/');
                push_escaped(pointer, name);

                if name == REFERENCE_FIELD {
                    if let Value::String(current) = child {
                        if let Some(resolved) = index.resolve(current) {
                            out.push(RewrittenReference {
                                pointer: pointer.clone(),
                                from: std::mem::replace(current, resolved.clone()),
                                to: resolved,
                            });
                        }
                    }
                } else {
                    walk(child, index, pointer, out);
                }

                pointer.truncate(len);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&i.to_string());
                walk(item, index, pointer, out);
                pointer.truncate(len);
            }
        }
        _ => {}
    }
}

/// Escapes a member name per RFC 6901.
fn push_escaped(pointer: &mut String, name: &str) {
    for c in name.chars() {
        match c {
            '~' => pointer.push_str("~0"),
            '/' => pointer.push_str("~1"),
            c => pointer.push(c),
        }
    }
}
