//! Response envelope shared by every REST endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, DomainResult};

/// `{ success?, message?, errors?, payload? }`
///
/// Every field is optional on the wire. `errors` is kept as raw JSON because
/// the backend sends either a list of strings or a field → messages map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    // `default` here would bound `T: Default`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: Some(true),
            message: None,
            errors: None,
            payload: Some(payload),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            message: Some(message.into()),
            errors: None,
            payload: None,
        }
    }

    /// Best human-readable description of a failure carried by the envelope.
    pub fn failure_message(&self) -> String {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return message.to_string();
        }
        match &self.errors {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join("; "),
            Some(other) => other.to_string(),
            None => "unknown error".to_string(),
        }
    }

    /// Unwrap the payload.
    ///
    /// An explicit `success: false` is a rejection even if a payload is
    /// present; an absent `success` flag is treated as success.
    pub fn into_payload(self, what: &str) -> DomainResult<T> {
        if self.success == Some(false) {
            return Err(DomainError::rejected(self.failure_message()));
        }
        self.payload
            .ok_or_else(|| DomainError::missing_payload(what.to_string()))
    }
}
