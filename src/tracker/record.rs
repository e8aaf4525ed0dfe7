//! Persisted error records.

use std::error::Error as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::classify::{AiFailure, ErrorKind};

/// Default number of characters of call input kept in a record.
pub const DEFAULT_INPUT_PREVIEW_LIMIT: usize = 200;

/// One tracked AI call failure, as written to an [`ErrorSink`](crate::sink::ErrorSink).
///
/// Field names serialize in camelCase to match the `AiError` table layout
/// used by the analytics side. Records are never updated by the tracker;
/// `resolved` is flipped by an external review workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "errorType")]
    pub kind: ErrorKind,
    /// Logical operation name (e.g. "lead_summary").
    pub endpoint: String,
    pub model_name: String,
    #[serde(rename = "errorMessage")]
    pub message: String,
    /// Source chain of the failure, one cause per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub resolved: bool,
}

impl ErrorRecord {
    /// Build a fresh, unresolved record for `failure`.
    ///
    /// `input_preview` is truncated to `preview_limit` characters.
    pub fn new(
        kind: ErrorKind,
        failure: &AiFailure,
        endpoint: &str,
        model_name: &str,
        input_preview: Option<&str>,
        preview_limit: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            endpoint: endpoint.to_string(),
            model_name: model_name.to_string(),
            message: failure.message(),
            stack_trace: source_chain(failure),
            input_preview: input_preview.map(|s| truncate_chars(s, preview_limit)),
            status: failure.status(),
            resolved: false,
        }
    }
}

/// Render the `source()` chain below `failure`, or `None` if it has no source.
fn source_chain(failure: &AiFailure) -> Option<String> {
    let mut lines = Vec::new();
    let mut next = failure.source();
    while let Some(cause) = next {
        lines.push(format!("caused by: {cause}"));
        next = cause.source();
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// First `limit` characters of `s` (not bytes, so multi-byte text stays valid).
pub(crate) fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
