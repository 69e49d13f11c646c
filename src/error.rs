//! Error types for the bridge surface

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::Diagnostic;
use crate::session::SessionError;

/// Bridge-level result type
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures of the bridge itself, as opposed to failed commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge service has stopped")]
    Stopped,

    #[error("Malformed request: {0}")]
    BadRequest(String),
}

/// Error body sent back to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable snake_case identifier
    pub kind: String,
    /// Text to show the user
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
    /// Underlying error, for logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&SessionError> for ErrorBody {
    fn from(err: &SessionError) -> Self {
        if matches!(err, SessionError::TaskFailed(_)) {
            tracing::error!("Internal error: {}", err);
        }

        Self {
            kind: err.kind().to_string(),
            message: err.user_message(),
            diagnostic: err.diagnostic(),
            details: Some(err.to_string()),
        }
    }
}

impl From<&BridgeError> for ErrorBody {
    fn from(err: &BridgeError) -> Self {
        let kind = match err {
            BridgeError::Stopped => "bridge_stopped",
            BridgeError::BadRequest(_) => "bad_request",
        };

        Self {
            kind: kind.to_string(),
            message: err.to_string(),
            diagnostic: None,
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_body() {
        let err = SessionError::Rejected {
            diagnostic: Diagnostic::HtmlMasquerade,
        };
        let body = ErrorBody::from(&err);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["kind"], "html_masquerade");
        assert_eq!(json["diagnostic"], "htmlMasquerade");
        assert!(json["message"].as_str().unwrap().contains("web page"));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let body = ErrorBody::from(&BridgeError::Stopped);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["kind"], "bridge_stopped");
        assert!(json.get("diagnostic").is_none());
        assert!(json.get("details").is_none());
    }
}
