//! Core contracts and helpers for fairscope.
//!
//! This crate defines the in-memory dataset, the attribute configuration
//! table, the boundary request/report contracts, and the error kinds shared by
//! the metrics engine and the CLI.

pub mod attributes;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod report;
pub mod request;
pub mod schema;
pub mod severity;
pub mod validation;

pub use attributes::{AttributeCatalog, AttributeKind, AttributeSpec, names_match};
pub use dataset::{Column, Dataset, Value};
pub use error::{AuditError, ErrorKind, ErrorMarker, Result};
pub use loader::{load_csv, load_records};
pub use report::{
    AggregateMetrics, AttributeFailure, AttributeReport, BiasReport, GroupStats, MetricResult,
    MetricSet, OutcomeRateTable, OutcomeRates, RawCounts, RawDataTable,
};
pub use request::{AuditOptions, AuditRequest, DatasetType};
pub use schema::{parse_request_json, report_json_schema, request_json_schema, validate_request_json};
pub use severity::{Severity, SeverityThresholds};
pub use validation::{ColumnRoles, ProtectedColumn, validate_roles};

/// Current contract version for `report.json` artifacts.
pub const REPORT_VERSION: &str = "0.1";

/// Report keys that cannot be used as attribute names.
pub const RESERVED_KEYS: [&str; 2] = ["outcome_rates", "raw_data"];
