//! AI call failures and their classification taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP status used by AI APIs for both rate limiting and exhausted quota.
const TOO_MANY_REQUESTS: u16 = 429;

/// Closed set of kinds every AI call failure is sorted into.
///
/// Serialized with the names used by the persisted error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "RATE_LIMIT")]
    RateLimited,
    #[serde(rename = "QUOTA_EXCEEDED")]
    QuotaExceeded,
    #[serde(rename = "MODEL_NOT_FOUND")]
    ModelUnavailable,
    #[serde(rename = "INVALID_REQUEST")]
    InvalidInput,
    #[serde(rename = "API_ERROR")]
    ApiError,
    #[serde(rename = "PARSING_ERROR")]
    ParseError,
    #[serde(rename = "UNKNOWN")]
    Unclassified,
}

impl ErrorKind {
    /// Every kind, in classification priority order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::QuotaExceeded,
        ErrorKind::RateLimited,
        ErrorKind::ModelUnavailable,
        ErrorKind::InvalidInput,
        ErrorKind::ParseError,
        ErrorKind::ApiError,
        ErrorKind::Unclassified,
    ];

    /// Persisted name, also used as the `kind` metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "RATE_LIMIT",
            ErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorKind::ModelUnavailable => "MODEL_NOT_FOUND",
            ErrorKind::InvalidInput => "INVALID_REQUEST",
            ErrorKind::ApiError => "API_ERROR",
            ErrorKind::ParseError => "PARSING_ERROR",
            ErrorKind::Unclassified => "UNKNOWN",
        }
    }

    /// Position in [`ErrorKind::ALL`]; used to index per-kind arrays.
    pub(crate) fn index(self) -> usize {
        match self {
            ErrorKind::QuotaExceeded => 0,
            ErrorKind::RateLimited => 1,
            ErrorKind::ModelUnavailable => 2,
            ErrorKind::InvalidInput => 3,
            ErrorKind::ParseError => 4,
            ErrorKind::ApiError => 5,
            ErrorKind::Unclassified => 6,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call to an external AI API.
///
/// Transports map their errors into this type so the tracker can classify
/// them from structured attributes rather than message text.
#[derive(Debug, thiserror::Error)]
pub enum AiFailure {
    /// The API answered with an error.
    ///
    /// `code` and `error_type` mirror the nested `error.code` /
    /// `error.type` fields of OpenAI-style error bodies.
    #[error("API error{}: {message}", status_suffix(.status))]
    Api {
        status: Option<u16>,
        code: Option<String>,
        error_type: Option<String>,
        message: String,
    },

    /// The API answered, but its payload could not be parsed.
    #[error("failed to parse AI response: {0}")]
    Parse(String),

    /// The request never produced an API answer (connection, timeout, ...).
    #[error("AI transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A failure that carries no diagnostic information at all.
    #[error("unknown AI failure")]
    Unspecified,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl AiFailure {
    /// API error with a status code and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        AiFailure::Api {
            status: Some(status),
            code: None,
            error_type: None,
            message: message.into(),
        }
    }

    /// Transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        AiFailure::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Set the nested error code of an [`AiFailure::Api`]. No-op on other variants.
    pub fn with_code(mut self, value: impl Into<String>) -> Self {
        if let AiFailure::Api { code, .. } = &mut self {
            *code = Some(value.into());
        }
        self
    }

    /// Set the nested error type of an [`AiFailure::Api`]. No-op on other variants.
    pub fn with_error_type(mut self, value: impl Into<String>) -> Self {
        if let AiFailure::Api { error_type, .. } = &mut self {
            *error_type = Some(value.into());
        }
        self
    }

    /// Build an API failure from an HTTP status and response body.
    ///
    /// Understands OpenAI-style bodies (`{"error": {"message", "type",
    /// "code"}}`); numeric codes are kept as their decimal string. Any
    /// other body becomes the message verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody { error }) => AiFailure::Api {
                status: Some(status),
                code: error.code.and_then(|c| match c {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                }),
                error_type: error.error_type,
                message: error.message.unwrap_or_else(|| body.to_string()),
            },
            Err(_) => AiFailure::api(status, body),
        }
    }

    /// The failure's own message, without the variant prefix of `Display`.
    pub fn message(&self) -> String {
        match self {
            AiFailure::Api { message, .. } | AiFailure::Transport { message, .. } => {
                message.clone()
            }
            AiFailure::Parse(detail) => detail.clone(),
            AiFailure::Unspecified => self.to_string(),
        }
    }

    /// HTTP-like status code, if the failure has one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AiFailure::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Nested error code (e.g. `insufficient_quota`).
    pub fn code(&self) -> Option<&str> {
        match self {
            AiFailure::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Nested error type (e.g. `invalid_request_error`).
    pub fn error_type(&self) -> Option<&str> {
        match self {
            AiFailure::Api { error_type, .. } => error_type.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AiFailure {
    fn from(err: serde_json::Error) -> Self {
        AiFailure::Parse(err.to_string())
    }
}

/// Sort a failure into its [`ErrorKind`]. First matching rule wins:
///
/// 1. status 429 with code `insufficient_quota` → [`ErrorKind::QuotaExceeded`]
/// 2. status 429 → [`ErrorKind::RateLimited`]
/// 3. code `model_not_found` → [`ErrorKind::ModelUnavailable`]
/// 4. type `invalid_request_error` → [`ErrorKind::InvalidInput`]
/// 5. unparseable response → [`ErrorKind::ParseError`]
/// 6. any other failure with diagnostics → [`ErrorKind::ApiError`]
/// 7. otherwise → [`ErrorKind::Unclassified`]
pub fn classify(failure: &AiFailure) -> ErrorKind {
    let status = failure.status();
    let code = failure.code();

    if status == Some(TOO_MANY_REQUESTS) {
        if code == Some("insufficient_quota") {
            return ErrorKind::QuotaExceeded;
        }
        return ErrorKind::RateLimited;
    }
    if code == Some("model_not_found") {
        return ErrorKind::ModelUnavailable;
    }
    if failure.error_type() == Some("invalid_request_error") {
        return ErrorKind::InvalidInput;
    }
    match failure {
        AiFailure::Parse(_) => ErrorKind::ParseError,
        AiFailure::Api { .. } | AiFailure::Transport { .. } => ErrorKind::ApiError,
        AiFailure::Unspecified => ErrorKind::Unclassified,
    }
}
