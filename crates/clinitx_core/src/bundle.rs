//! Bundle data model.
//!
//! Bundles use the FHIR JSON field names, so a request body deserializes
//! directly:
//!
//! ```rust
//! use clinitx_core::{Bundle, BundleType};
//!
//! let bundle: Bundle = serde_json::from_str(r#"{
//!     "resourceType": "Bundle",
//!     "type": "transaction",
//!     "entry": [{
//!         "fullUrl": "urn:uuid:p1",
//!         "resource": {"resourceType": "Patient"},
//!         "request": {"method": "POST", "url": "Patient"}
//!     }]
//! }"#).unwrap();
//! assert_eq!(bundle.bundle_type, BundleType::Transaction);
//! ```

use crate::error::{CoreError, CoreResult};
use clinitx_storage::{PersistOp, ResourceKey, StoredResource, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Literal `resourceType` of a bundle.
const BUNDLE_RESOURCE_TYPE: &str = "Bundle";

/// Declared processing mode of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    /// All-or-nothing processing.
    Transaction,
    /// Independent processing of each entry.
    Batch,
    /// Response to a transaction.
    TransactionResponse,
    /// Response to a batch.
    BatchResponse,
    /// Any other FHIR bundle type; never processed.
    #[serde(other)]
    Other,
}

impl fmt::Display for BundleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BundleType::Transaction => "transaction",
            BundleType::Batch => "batch",
            BundleType::TransactionResponse => "transaction-response",
            BundleType::BatchResponse => "batch-response",
            BundleType::Other => "other",
        };
        f.write_str(name)
    }
}

/// HTTP verb of a bundle entry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read.
    Get,
    /// Create.
    Post,
    /// Update.
    Put,
    /// Partial update.
    Patch,
    /// Delete.
    Delete,
}

/// The request part of a bundle entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRequest {
    /// HTTP verb.
    pub method: Method,
    /// Relative target URL (`Patient` for a create, `Patient/123` for an update).
    pub url: String,
}

/// One resource operation within a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    /// Client-chosen placeholder identifying this entry within the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    /// The resource body.
    pub resource: Value,
    /// The operation to perform.
    pub request: EntryRequest,
}

impl BundleEntry {
    /// Creates an entry that creates `resource` under a store-minted id.
    #[must_use]
    pub fn create(full_url: impl Into<String>, resource: Value) -> Self {
        let url = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            full_url: Some(full_url.into()),
            resource,
            request: EntryRequest {
                method: Method::Post,
                url,
            },
        }
    }

    /// Creates an entry that updates the resource at `key`.
    #[must_use]
    pub fn update(full_url: impl Into<String>, key: &ResourceKey, resource: Value) -> Self {
        Self {
            full_url: Some(full_url.into()),
            resource,
            request: EntryRequest {
                method: Method::Put,
                url: key.to_string(),
            },
        }
    }

    /// Derives the store operation from the entry's request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidBundle`] for verbs other than POST and
    /// PUT, or for a URL that does not fit the verb.
    pub fn operation(&self) -> CoreResult<PersistOp> {
        let url = self.request.url.trim_matches('/');
        match self.request.method {
            Method::Post => {
                if url.is_empty() || url.contains('/') {
                    return Err(CoreError::invalid_bundle(format!(
                        "create url must be a resource type, got {:?}",
                        self.request.url
                    )));
                }
                Ok(PersistOp::Create {
                    resource_type: url.to_string(),
                })
            }
            Method::Put => {
                let key = ResourceKey::parse(url).ok_or_else(|| {
                    CoreError::invalid_bundle(format!(
                        "update url must be Type/id, got {:?}",
                        self.request.url
                    ))
                })?;
                Ok(PersistOp::Update { key })
            }
            other => Err(CoreError::invalid_bundle(format!(
                "{other:?} entries are not supported"
            ))),
        }
    }
}

/// An ordered batch of resource operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Always `"Bundle"`.
    #[serde(rename = "resourceType", default = "bundle_resource_type")]
    pub resource_type: String,
    /// Processing mode.
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
    /// Entries in processing order.
    #[serde(rename = "entry", default)]
    pub entries: Vec<BundleEntry>,
}

fn bundle_resource_type() -> String {
    BUNDLE_RESOURCE_TYPE.to_string()
}

impl Bundle {
    /// Creates a transaction bundle.
    #[must_use]
    pub fn transaction(entries: Vec<BundleEntry>) -> Self {
        Self::with_type(BundleType::Transaction, entries)
    }

    /// Creates a batch bundle.
    #[must_use]
    pub fn batch(entries: Vec<BundleEntry>) -> Self {
        Self::with_type(BundleType::Batch, entries)
    }

    fn with_type(bundle_type: BundleType, entries: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: bundle_resource_type(),
            bundle_type,
            entries,
        }
    }

    /// Parses a bundle from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] if the text is not a well-formed bundle,
    /// or [`CoreError::InvalidBundle`] if its `resourceType` is not `Bundle`.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        let bundle: Bundle = serde_json::from_str(text)?;
        if bundle.resource_type != BUNDLE_RESOURCE_TYPE {
            return Err(CoreError::invalid_bundle(format!(
                "expected resourceType Bundle, got {}",
                bundle.resource_type
            )));
        }
        Ok(bundle)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the bundle has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome details of one response entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryOutcome {
    /// HTTP status line, e.g. `201 Created`.
    pub status: String,
    /// Version-qualified location of the written resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Weak ETag carrying the version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// OperationOutcome for a failed batch entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
}

/// One entry of a response bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    /// Permanent identifier of the written resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    /// The resource as stored, with references resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    /// Outcome details.
    pub response: EntryOutcome,
}

impl EntryResponse {
    /// Builds the response entry for a successful write.
    #[must_use]
    pub fn written(stored: StoredResource, base_url: Option<&str>) -> Self {
        let status = if stored.created {
            "201 Created"
        } else {
            "200 OK"
        };
        let full_url = match base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), stored.key),
            None => stored.key.to_string(),
        };
        Self {
            full_url: Some(full_url),
            response: EntryOutcome {
                status: status.to_string(),
                location: Some(stored.versioned_reference()),
                etag: Some(weak_etag(stored.version)),
                outcome: None,
            },
            resource: Some(stored.body),
        }
    }

    /// Builds the response entry for a failed batch entry.
    #[must_use]
    pub fn failed(status: u16, outcome: Value) -> Self {
        Self {
            full_url: None,
            resource: None,
            response: EntryOutcome {
                status: status.to_string(),
                location: None,
                etag: None,
                outcome: Some(outcome),
            },
        }
    }

    /// Returns the numeric status code.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.response
            .status
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
    }
}

/// Renders a weak ETag for a version.
#[must_use]
pub fn weak_etag(version: VersionId) -> String {
    format!("W/\"{version}\"")
}

/// A response bundle, one entry per request entry in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleResponse {
    /// Always `"Bundle"`.
    #[serde(rename = "resourceType", default = "bundle_resource_type")]
    pub resource_type: String,
    /// `transaction-response` or `batch-response`.
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
    /// Response entries.
    #[serde(rename = "entry", default)]
    pub entries: Vec<EntryResponse>,
}

impl BundleResponse {
    /// Creates a response bundle.
    #[must_use]
    pub fn new(bundle_type: BundleType, entries: Vec<EntryResponse>) -> Self {
        Self {
            resource_type: bundle_resource_type(),
            bundle_type,
            entries,
        }
    }

    /// Renders the response as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] if serialization fails.
    pub fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_fhir_transaction() {
        let text = json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": [
                {
                    "fullUrl": "urn:uuid:p1",
                    "resource": {"resourceType": "Patient"},
                    "request": {"method": "POST", "url": "Patient"}
                },
                {
                    "resource": {"resourceType": "Patient", "id": "x"},
                    "request": {"method": "PUT", "url": "Patient/x"}
                }
            ]
        })
        .to_string();

        let bundle = Bundle::from_json(&text).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.entries[0].full_url.as_deref(), Some("urn:uuid:p1"));
        assert!(bundle.entries[1].full_url.is_none());
        assert_eq!(bundle.entries[1].request.method, Method::Put);
    }

    #[test]
    fn unknown_bundle_type_maps_to_other() {
        let text = r#"{"resourceType": "Bundle", "type": "searchset"}"#;
        let bundle = Bundle::from_json(text).unwrap();
        assert_eq!(bundle.bundle_type, BundleType::Other);
        assert!(bundle.is_empty());
    }

    #[test]
    fn rejects_non_bundle_resource() {
        let text = r#"{"resourceType": "Patient", "type": "transaction"}"#;
        assert!(matches!(
            Bundle::from_json(text),
            Err(CoreError::InvalidBundle { .. })
        ));
    }

    #[test]
    fn malformed_json_is_json_error() {
        assert!(matches!(Bundle::from_json("{"), Err(CoreError::Json(_))));
    }

    #[test]
    fn operation_from_request() {
        let create = BundleEntry::create("urn:p1", json!({"resourceType": "Patient"}));
        assert_eq!(
            create.operation().unwrap(),
            PersistOp::Create {
                resource_type: "Patient".into()
            }
        );

        let key = ResourceKey::new("Patient", "p9");
        let update = BundleEntry::update("urn:p9", &key, json!({"resourceType": "Patient"}));
        assert_eq!(update.operation().unwrap(), PersistOp::Update { key });
    }

    #[test]
    fn operation_rejects_unsupported_verbs_and_urls() {
        let mut entry = BundleEntry::create("urn:p1", json!({"resourceType": "Patient"}));
        entry.request.method = Method::Delete;
        assert!(entry.operation().is_err());

        entry.request.method = Method::Post;
        entry.request.url = "Patient/123".into();
        assert!(entry.operation().is_err());

        entry.request.method = Method::Put;
        entry.request.url = "Patient".into();
        assert!(entry.operation().is_err());
    }

    #[test]
    fn written_entry_response() {
        let stored = StoredResource::new(
            ResourceKey::new("Patient", "abc"),
            VersionId::INITIAL,
            json!({"resourceType": "Patient"}),
            true,
        );
        let entry = EntryResponse::written(stored, Some("http://fhir.example/r4/"));
        assert_eq!(
            entry.full_url.as_deref(),
            Some("http://fhir.example/r4/Patient/abc")
        );
        assert_eq!(entry.response.status, "201 Created");
        assert_eq!(entry.status_code(), Some(201));
        assert_eq!(
            entry.response.location.as_deref(),
            Some("Patient/abc/_history/1")
        );
        assert_eq!(entry.response.etag.as_deref(), Some("W/\"1\""));
    }

    #[test]
    fn response_serializes_with_fhir_names() {
        let response = BundleResponse::new(BundleType::TransactionResponse, vec![]);
        let value = response.to_value().unwrap();
        assert_eq!(value["resourceType"], "Bundle");
        assert_eq!(value["type"], "transaction-response");
    }
}
