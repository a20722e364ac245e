//! OperationOutcome rendering of errors.

use crate::error::CoreError;
use clinitx_storage::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// The request could not be completed.
    Error,
    /// Something unexpected happened but processing continued.
    Warning,
    /// Informational only.
    Information,
}

/// FHIR issue type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    /// The content does not match the expected structure.
    Structure,
    /// The content is invalid.
    Invalid,
    /// The same item appears more than once.
    Duplicate,
    /// The referenced resource does not exist.
    NotFound,
    /// The operation is not supported by this server.
    NotSupported,
    /// A version conflict was detected.
    Conflict,
    /// The request ran out of time.
    Timeout,
    /// Processing was stopped on request.
    Incomplete,
    /// An unexpected internal error.
    Exception,
}

/// One issue of an [`OperationOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// How bad the issue is.
    pub severity: IssueSeverity,
    /// What kind of issue it is.
    pub code: IssueCode,
    /// Human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    /// FHIRPath locations of the issue within the request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
}

/// A FHIR OperationOutcome resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Always `"OperationOutcome"`.
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    /// The issues.
    #[serde(rename = "issue")]
    pub issues: Vec<Issue>,
}

impl OperationOutcome {
    /// Creates an outcome with a single error issue.
    #[must_use]
    pub fn error(code: IssueCode, diagnostics: impl Into<String>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issues: vec![Issue {
                severity: IssueSeverity::Error,
                code,
                diagnostics: Some(diagnostics.into()),
                expression: Vec::new(),
            }],
        }
    }

    /// Points the first issue at a bundle entry.
    #[must_use]
    pub fn at_entry(mut self, index: usize) -> Self {
        if let Some(issue) = self.issues.first_mut() {
            issue.expression.push(format!("Bundle.entry[{index}]"));
        }
        self
    }

    /// Renders a bundle failure.
    #[must_use]
    pub fn from_error(err: &CoreError) -> Self {
        let code = match err {
            CoreError::UnsupportedOperation { .. } => IssueCode::NotSupported,
            CoreError::DuplicatePlaceholder { .. } => IssueCode::Duplicate,
            CoreError::InvalidBundle { .. } => IssueCode::Invalid,
            CoreError::Json(_) => IssueCode::Structure,
            CoreError::EntryPersistence { source, .. } | CoreError::Scope { source } => {
                storage_issue_code(source)
            }
            CoreError::TimedOut { .. } => IssueCode::Timeout,
            CoreError::Cancelled { .. } => IssueCode::Incomplete,
        };
        let outcome = Self::error(code, err.to_string());
        match err {
            CoreError::EntryPersistence { index, .. }
            | CoreError::DuplicatePlaceholder { index, .. } => outcome.at_entry(*index),
            _ => outcome,
        }
    }

    /// Renders a single store failure.
    #[must_use]
    pub fn from_storage_error(err: &StorageError) -> Self {
        Self::error(storage_issue_code(err), err.to_string())
    }

    /// Renders the outcome as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn storage_issue_code(err: &StorageError) -> IssueCode {
    match err {
        StorageError::Validation(_) => IssueCode::Invalid,
        StorageError::NotFound { .. } => IssueCode::NotFound,
        StorageError::VersionConflict { .. } => IssueCode::Conflict,
        StorageError::Unsupported { .. } => IssueCode::NotSupported,
        StorageError::TransactionInactive | StorageError::Internal(_) => IssueCode::Exception,
    }
}

impl From<&CoreError> for OperationOutcome {
    fn from(err: &CoreError) -> Self {
        Self::from_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinitx_storage::ResourceKey;
    use serde_json::json;

    #[test]
    fn unsupported_renders_not_supported() {
        let err = CoreError::UnsupportedOperation {
            backend: "partitioned",
        };
        let value = OperationOutcome::from_error(&err).to_value();
        assert_eq!(value["resourceType"], "OperationOutcome");
        assert_eq!(value["issue"][0]["severity"], "error");
        assert_eq!(value["issue"][0]["code"], "not-supported");
        assert!(value["issue"][0]["diagnostics"]
            .as_str()
            .unwrap()
            .contains("partitioned"));
    }

    #[test]
    fn entry_failure_points_at_entry() {
        let err = CoreError::entry(
            3,
            Some("urn:uuid:x"),
            StorageError::NotFound {
                key: ResourceKey::new("Patient", "gone"),
            },
        );
        let outcome = OperationOutcome::from_error(&err);
        assert_eq!(outcome.issues[0].code, IssueCode::NotFound);
        assert_eq!(outcome.issues[0].expression, vec!["Bundle.entry[3]"]);
    }

    #[test]
    fn commit_conflict_is_conflict() {
        let err = CoreError::scope(StorageError::VersionConflict {
            key: ResourceKey::new("Patient", "a"),
            expected: None,
            actual: None,
        });
        assert_eq!(
            OperationOutcome::from_error(&err).issues[0].code,
            IssueCode::Conflict
        );
    }

    #[test]
    fn lifetime_errors() {
        assert_eq!(
            OperationOutcome::from_error(&CoreError::TimedOut { index: 0 }).issues[0].code,
            IssueCode::Timeout
        );
        assert_eq!(
            OperationOutcome::from_error(&CoreError::Cancelled { index: 0 }).issues[0].code,
            IssueCode::Incomplete
        );
    }

    #[test]
    fn empty_expression_is_omitted() {
        let value = OperationOutcome::error(IssueCode::Invalid, "bad").to_value();
        assert_eq!(
            value,
            json!({
                "resourceType": "OperationOutcome",
                "issue": [{"severity": "error", "code": "invalid", "diagnostics": "bad"}]
            })
        );
    }
}
