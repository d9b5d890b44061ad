use fairscope_core::{AuditError, BiasReport, Result, parse_request_json};
use fairscope_metrics::AuditEngine;

/// Audit one boundary request given as JSON text. The request is validated
/// against the request schema before it is deserialized.
pub fn respond(input: &str, engine: &AuditEngine) -> Result<BiasReport> {
    let value: serde_json::Value = serde_json::from_str(input)
        .map_err(|err| AuditError::Schema(format!("request is not valid JSON: {err}")))?;
    let request = parse_request_json(value)?;
    tracing::debug!(rows = request.rows.len(), "worker request accepted");
    Ok(engine.run_request(request)?.report)
}

/// Encode a worker result for stdout: the report itself, or
/// `{"error": {"kind", "message"}}`.
pub fn encode_response(result: &Result<BiasReport>) -> serde_json::Result<String> {
    match result {
        Ok(report) => serde_json::to_string(report),
        Err(err) => serde_json::to_string(&serde_json::json!({ "error": err.marker() })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairscope_core::ErrorKind;

    #[test]
    fn valid_request_produces_report() {
        let input = serde_json::json!({
            "rows": [
                {"Gender": "Male", "Outcome": "Approved"},
                {"Gender": "Female", "Outcome": "Denied"},
                {"Gender": "Female", "Outcome": "Approved"}
            ],
            "outcomeColumn": "Outcome",
            "protectedAttributes": ["Gender"],
            "datasetType": "modelOutcome"
        })
        .to_string();
        let result = respond(&input, &AuditEngine::default());
        let encoded: serde_json::Value =
            serde_json::from_str(&encode_response(&result).expect("encode")).expect("json");
        assert_eq!(encoded["datasetType"], "modelOutcome");
        assert_eq!(encoded["original"]["Gender"]["statistical_parity_difference"], -0.5);
    }

    #[test]
    fn schema_violations_are_reported_as_error_payload() {
        let result = respond(r#"{"rows": []}"#, &AuditEngine::default());
        assert!(matches!(&result, Err(err) if err.kind() == ErrorKind::Schema));
        let encoded: serde_json::Value =
            serde_json::from_str(&encode_response(&result).expect("encode")).expect("json");
        assert_eq!(encoded["error"]["kind"], "schema");
    }

    #[test]
    fn non_json_input_is_a_schema_error() {
        let err = respond("not json", &AuditEngine::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
