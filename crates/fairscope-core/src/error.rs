use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured classification carried by every audit error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    GroupResolution,
    Computation,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Schema => "schema",
            ErrorKind::GroupResolution => "group_resolution",
            ErrorKind::Computation => "computation",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type shared across fairscope crates.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Bad or missing columns, or an empty dataset.
    #[error("schema error: {0}")]
    Schema(String),
    /// A protected attribute cannot be partitioned into comparable groups.
    #[error("group resolution error for '{attribute}': {message}")]
    GroupResolution { attribute: String, message: String },
    /// The computation failed, or an external computation step did.
    #[error("computation error: {message}")]
    Computation {
        message: String,
        diagnostics: Option<String>,
    },
    /// The result cannot be represented in the output contract.
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuditError {
    pub fn group_resolution(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        AuditError::GroupResolution {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn computation(message: impl Into<String>, diagnostics: Option<String>) -> Self {
        AuditError::Computation {
            message: message.into(),
            diagnostics,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::Schema(_) | AuditError::Csv(_) => ErrorKind::Schema,
            AuditError::GroupResolution { .. } => ErrorKind::GroupResolution,
            AuditError::Computation { .. } => ErrorKind::Computation,
            AuditError::Serialization(_) | AuditError::Json(_) => ErrorKind::Serialization,
        }
    }

    /// Raw diagnostic output attached to computation failures.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            AuditError::Computation { diagnostics, .. } => diagnostics.as_deref(),
            _ => None,
        }
    }

    pub fn marker(&self) -> ErrorMarker {
        ErrorMarker {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serializable form of an error, used in reports and worker responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorMarker {
    pub kind: ErrorKind,
    pub message: String,
}

/// Convenience alias for results returned by fairscope crates.
pub type Result<T> = std::result::Result<T, AuditError>;
