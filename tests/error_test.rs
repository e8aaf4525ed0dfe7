use muninn::{AiFailure, MuninnError, Result};

#[test]
fn test_error_display() {
    let err = MuninnError::Persistence {
        sink: "jsonl".to_string(),
        message: "permission denied".to_string(),
    };
    let text = err.to_string();
    assert!(text.contains("jsonl"));
    assert!(text.contains("permission denied"));
}

#[test]
fn test_no_sink() {
    assert!(MuninnError::NoSink.to_string().contains("no error sink"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(MuninnError::NoSink)
    }
    assert!(returns_error().is_err());
}

#[test]
fn test_json_error_converts() {
    fn parse(text: &str) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(text)?)
    }
    assert!(matches!(parse("{"), Err(MuninnError::Json(_))));
}

// ============================================================================
// AiFailure
// ============================================================================

#[test]
fn api_failure_display_includes_status() {
    let failure = AiFailure::api(503, "The engine is currently overloaded");
    let text = failure.to_string();
    assert!(text.contains("503"));
    assert!(text.contains("overloaded"));
}

#[test]
fn from_response_reads_openai_error_body() {
    let body = r#"{"error":{"message":"The model `gpt-5` does not exist","type":"invalid_request_error","param":null,"code":"model_not_found"}}"#;
    let failure = AiFailure::from_response(404, body);

    assert_eq!(failure.status(), Some(404));
    assert_eq!(failure.code(), Some("model_not_found"));
    assert_eq!(failure.error_type(), Some("invalid_request_error"));
    assert!(failure.to_string().contains("does not exist"));
}

#[test]
fn from_response_keeps_unstructured_body_as_message() {
    let failure = AiFailure::from_response(502, "<html>Bad Gateway</html>");
    assert_eq!(failure.status(), Some(502));
    assert_eq!(failure.code(), None);
    assert!(failure.to_string().contains("Bad Gateway"));
}

#[test]
fn transport_failure_has_no_status() {
    let failure = AiFailure::transport("connection reset by peer");
    assert_eq!(failure.status(), None);
    assert!(failure.to_string().contains("connection reset"));
}
