//! The `{ "result": { "code": ..., "value": ... } }` envelope every call returns.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Result code the server uses for a successful call.
pub const SUCCESS: &str = "success";

#[derive(Debug, Deserialize)]
struct Envelope {
    result: ResultBody,
}

/// The decoded `result` object.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultBody {
    /// Result code, `success` when the call worked.
    #[serde(default)]
    pub code: String,
    /// Call-specific payload.
    #[serde(default)]
    pub value: Value,
}

impl ResultBody {
    /// Parse a raw response body.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the body is not JSON or lacks the `result` object.
    pub fn parse(endpoint: &str, body: &str) -> Result<Self> {
        serde_json::from_str::<Envelope>(body)
            .map(|envelope| envelope.result)
            .map_err(|e| ApiError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })
    }

    /// Returns true if the code reports success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS
    }

    /// The value as a string, if it is one.
    #[must_use]
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Fail with `Rejected` unless the code reports success.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` carrying the code and value.
    pub fn require_success(self, operation: &'static str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.rejected(operation))
        }
    }

    /// Build a `Rejected` error describing this body.
    #[must_use]
    pub fn rejected(&self, operation: &'static str) -> ApiError {
        ApiError::Rejected {
            operation,
            detail: format!("code={} value={}", self.code, self.value),
        }
    }

    /// Decode the value as a list of records.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the value is not an array of the expected records.
    pub fn records<T: DeserializeOwned>(self, endpoint: &str) -> Result<Vec<T>> {
        if self.value.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.value).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}
