//! Unified stage failure type.
//!
//! Upstream sources report "not found" in two ways: as an HTTP error, or as a
//! well-formed body carrying an `error` field. Stages fold both into a single
//! `Result<Value, StageFailure>`; [`StageFailure::origin`] keeps track of which
//! path produced the failure so reports can still tell them apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    /// The stage returned normally with an in-band `error` payload.
    PayloadError,
    /// The stage raised: network error, timeout, panic, deadline.
    Exception,
}

/// What kind of failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed identifier, detected before any network call.
    Validation,
    /// Upstream answered that the resource does not exist.
    NotFound,
    /// Upstream answered 200 with missing or incomplete data.
    Upstream,
    /// A required prior-stage output is absent.
    MissingInput,
    /// Read or connect timeout after retries.
    Timeout,
    /// Connection refused or reset after retries.
    Connection,
    /// Terminal HTTP status.
    Http,
    /// Other transport-level failure.
    Transport,
    /// Body could not be decoded.
    Decode,
    /// Text-generation call failed.
    Provider,
    /// Unit or run deadline passed.
    DeadlineExceeded,
    /// The stage panicked.
    Panic,
    /// Anything else.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::NotFound => "not_found",
            FailureKind::Upstream => "upstream",
            FailureKind::MissingInput => "missing_input",
            FailureKind::Timeout => "timeout",
            FailureKind::Connection => "connection",
            FailureKind::Http => "http",
            FailureKind::Transport => "transport",
            FailureKind::Decode => "decode",
            FailureKind::Provider => "provider",
            FailureKind::DeadlineExceeded => "deadline_exceeded",
            FailureKind::Panic => "panic",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage failure, in-band or raised.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct StageFailure {
    pub origin: ErrorSource,
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    /// In-band failure: the stage returned an error payload.
    pub fn payload(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            origin: ErrorSource::PayloadError,
            kind,
            message: message.into(),
        }
    }

    /// Raised failure: the stage could not produce a payload at all.
    pub fn exception(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            origin: ErrorSource::Exception,
            kind,
            message: message.into(),
        }
    }

    /// Human-readable cause recorded on the task result.
    ///
    /// Raised failures are prefixed with their kind, the way an exception
    /// is reported with its type name.
    pub fn describe(&self) -> String {
        match self.origin {
            ErrorSource::PayloadError => self.message.clone(),
            ErrorSource::Exception => format!("{}: {}", self.kind, self.message),
        }
    }
}

/// Result of one stage execution.
pub type StageResult = Result<Value, StageFailure>;

/// The in-band error carried by a payload, if any.
///
/// A payload signals failure with a top-level `error` key. Non-string values
/// are rendered as JSON.
pub fn payload_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => Some("unspecified error".to_string()),
        other => Some(other.to_string()),
    }
}

/// Turn a payload with an in-band `error` key into a failure.
pub fn check_payload(value: Value) -> StageResult {
    match payload_error(&value) {
        Some(message) => Err(StageFailure::payload(FailureKind::Upstream, message)),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_error_detected() {
        let value = json!({"error": "Protein X not found in AlphaFold"});
        let failure = check_payload(value).unwrap_err();
        assert_eq!(failure.origin, ErrorSource::PayloadError);
        assert_eq!(failure.describe(), "Protein X not found in AlphaFold");
    }

    #[test]
    fn test_clean_payload_passes() {
        let value = json!({"uniprot_id": "Q8I3H7", "errors_seen": 0});
        assert_eq!(check_payload(value.clone()).unwrap(), value);
    }

    #[test]
    fn test_non_string_error_rendered() {
        assert_eq!(
            payload_error(&json!({"error": {"code": 7}})).as_deref(),
            Some("{\"code\":7}")
        );
    }

    #[test]
    fn test_exception_describe_includes_kind() {
        let failure = StageFailure::exception(FailureKind::Timeout, "GET /x timed out");
        assert_eq!(failure.describe(), "timeout: GET /x timed out");
    }
}
