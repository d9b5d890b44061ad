use jsonschema::JSONSchema;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde_json::Value;

use crate::error::{AuditError, Result};
use crate::report::BiasReport;
use crate::request::AuditRequest;

/// Emit the JSON Schema for the boundary request.
pub fn request_json_schema() -> RootSchema {
    schema_for!(AuditRequest)
}

/// Emit the JSON Schema for `report.json`.
pub fn report_json_schema() -> RootSchema {
    schema_for!(BiasReport)
}

/// Validate a request document against the request JSON Schema, returning one
/// message per violation.
pub fn validate_request_json(request_json: &Value) -> Result<Vec<String>> {
    let schema = serde_json::to_value(request_json_schema())?;
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| AuditError::Serialization(err.to_string()))?;

    let mut issues = Vec::new();
    if let Err(errors) = compiled.validate(request_json) {
        for error in errors {
            let path = error.instance_path.to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            issues.push(format!("{path}: {error}"));
        }
    }
    Ok(issues)
}

/// Validate then deserialize a request document.
pub fn parse_request_json(request_json: Value) -> Result<AuditRequest> {
    let issues = validate_request_json(&request_json)?;
    if !issues.is_empty() {
        return Err(AuditError::Schema(format!(
            "request does not match schema: {}",
            issues.join("; ")
        )));
    }
    serde_json::from_value(request_json).map_err(|err| AuditError::Schema(err.to_string()))
}
