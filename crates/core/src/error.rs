use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("FHIR mapping error: {0}")]
    Fhir(#[from] fhir::FhirError),

    #[error("failed to parse response JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Build a [`CoreError::Server`] from a failed response body.
    ///
    /// When the body is an `OperationOutcome`, the message is the `issue[].diagnostics`
    /// joined with `"; "`. Otherwise the raw body is used.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = operation_outcome_diagnostics(body).unwrap_or_else(|| body.to_string());
        CoreError::Server { status, message }
    }
}

fn operation_outcome_diagnostics(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    if json.get("resourceType").and_then(Value::as_str) != Some("OperationOutcome") {
        return None;
    }
    let messages: Vec<&str> = json
        .get("issue")?
        .as_array()?
        .iter()
        .filter_map(|issue| issue.get("diagnostics").and_then(Value::as_str))
        .collect();
    (!messages.is_empty()).then(|| messages.join("; "))
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_operation_outcome_diagnostics() {
        let body = r#"{
          "resourceType": "OperationOutcome",
          "issue": [
            {"severity": "error", "code": "required", "diagnostics": "Flag.status: minimum required = 1"},
            {"severity": "error", "code": "invalid"},
            {"severity": "error", "code": "value", "diagnostics": "Unknown code 'x'"}
          ]
        }"#;
        match CoreError::from_response(422, body) {
            CoreError::Server { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(
                    message,
                    "Flag.status: minimum required = 1; Unknown code 'x'"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_raw_body() {
        let err = CoreError::from_response(502, "Bad Gateway");
        assert_eq!(err.to_string(), "server returned HTTP 502: Bad Gateway");

        let err = CoreError::from_response(404, r#"{"resourceType": "Flag"}"#);
        assert!(err.to_string().ends_with(r#"{"resourceType": "Flag"}"#));
    }

    #[test]
    fn validation_message_lists_every_problem() {
        let err = CoreError::Validation(vec![
            "Status is required".into(),
            "Code is required".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: Status is required; Code is required"
        );
    }
}
