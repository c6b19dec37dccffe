use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    Transport,
    Internal,
    Unknown,
}

impl ErrorCode {
    /// Maps the loose error tags a backend method may raise onto a code.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "401" | "unauthorized" | "not_logged_in" => Self::Unauthorized,
            "403" | "forbidden" | "not_authorized" => Self::Forbidden,
            "404" | "not_found" => Self::NotFound,
            "400" | "validation" | "validation_error" | "bad_request" => Self::Validation,
            "409" | "conflict" | "already_exists" => Self::Conflict,
            "transport" => Self::Transport,
            "500" | "internal" | "internal_error" => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

/// Failure reported by the remote command executor.
///
/// `reason` is the human readable text the backend attached and is shown to
/// the user unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(from = "RemoteErrorBody")]
#[error("{reason}")]
pub struct RemoteError {
    #[serde(rename = "error")]
    pub code: ErrorCode,
    pub reason: String,
}

impl RemoteError {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transport, reason)
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, reason)
    }
}

#[derive(Deserialize)]
struct RemoteErrorBody {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<RemoteErrorBody> for RemoteError {
    fn from(body: RemoteErrorBody) -> Self {
        let code = match &body.error {
            Some(serde_json::Value::String(raw)) => ErrorCode::from_wire(raw),
            Some(serde_json::Value::Number(raw)) => ErrorCode::from_wire(&raw.to_string()),
            _ => ErrorCode::Unknown,
        };
        let reason = body
            .reason
            .or(body.message)
            .unwrap_or_else(|| "remote command failed".to_string());
        Self { code, reason }
    }
}
