//! Bias metrics for tabular decision data.
//!
//! The pipeline resolves favorable outcomes and protected groups, computes
//! statistical parity difference and disparate impact, reweighs training data
//! and assembles a [`fairscope_core::BiasReport`].

pub mod assembler;
pub mod engine;
pub mod export;
pub mod groups;
pub mod metrics;
pub mod outcome;
pub mod report;
pub mod reweighing;

pub use assembler::{DisplayTables, assemble, display_tables};
pub use engine::{AuditEngine, AuditOutcome, AuditSummary};
pub use export::{weight_column_name, write_weighted_csv};
pub use groups::{Category, GroupPartition, ResolvedAttribute, resolve_attribute, resolve_spec};
pub use metrics::{GroupTally, MetricsEngine, parity};
pub use outcome::{Outcomes, resolve_outcomes};
pub use report::{SummaryRow, render_report, summary_rows, worst_severity};
pub use reweighing::{Reweighing, reweigh};
