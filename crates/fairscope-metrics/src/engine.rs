use std::collections::BTreeMap;
use std::time::Instant;

use fairscope_core::{
    AttributeCatalog, AttributeFailure, AttributeReport, AuditError, AuditOptions, AuditRequest,
    BiasReport, Dataset, Result, validate_roles,
};

use crate::assembler::{assemble, display_tables};
use crate::groups::{ResolvedAttribute, resolve_attribute, resolve_spec};
use crate::metrics::MetricsEngine;
use crate::outcome::resolve_outcomes;
use crate::reweighing::{Reweighing, reweigh};

/// Report plus the artifacts the CLI persists next to it.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub report: BiasReport,
    /// Reweighing weights per row; present for training datasets.
    pub weights: Option<Vec<f64>>,
    pub summary: AuditSummary,
}

/// Counters describing one audit.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditSummary {
    pub rows: usize,
    pub rows_missing_outcome: usize,
    pub favorable_labels: Vec<String>,
    pub attributes_resolved: usize,
    pub attributes_failed: usize,
    /// Columns that are neither the outcome nor protected.
    pub passthrough_columns: usize,
    pub reweighing_sweeps: Option<usize>,
    pub reweighing_converged: Option<bool>,
    pub empty_cells: Option<usize>,
    pub duration_ms: u128,
}

/// Run the full audit pipeline: validation, outcome and group resolution,
/// metrics, reweighing and assembly.
#[derive(Debug, Clone)]
pub struct AuditEngine {
    catalog: AttributeCatalog,
}

impl Default for AuditEngine {
    fn default() -> Self {
        Self::new(AttributeCatalog::conventional())
    }
}

impl AuditEngine {
    pub fn new(catalog: AttributeCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    pub fn run_request(&self, request: AuditRequest) -> Result<AuditOutcome> {
        let (dataset, options) = request.into_parts()?;
        self.run(&dataset, &options)
    }

    /// Audit one dataset.
    ///
    /// Dataset-level problems (no rows, missing outcome column, unusable
    /// outcome) fail the call. Attribute-level problems become error markers
    /// under that attribute's key while the other attributes are still
    /// computed.
    pub fn run(&self, dataset: &Dataset, options: &AuditOptions) -> Result<AuditOutcome> {
        let started = Instant::now();
        let catalog = self.catalog.merged(&options.attributes);
        let roles = validate_roles(dataset, options, &catalog)?;
        let outcomes = resolve_outcomes(dataset, roles.outcome_index, &options.positive_labels)?;

        tracing::info!(
            rows = dataset.len(),
            outcome = %roles.outcome,
            attributes = options.protected_attributes.len(),
            dataset_type = options.dataset_type.as_str(),
            passthrough = ?roles.passthrough,
            "audit started"
        );
        if outcomes.missing_rows() > 0 {
            tracing::warn!(
                rows = outcomes.missing_rows(),
                "rows with a missing outcome excluded"
            );
        }

        let mut resolved: Vec<ResolvedAttribute> = Vec::new();
        let mut failures: BTreeMap<String, AttributeReport> = BTreeMap::new();

        for column in &roles.protected {
            let spec = resolve_spec(dataset, column, options, &catalog);
            match resolve_attribute(dataset, column, &spec, &outcomes) {
                Ok(attribute) => resolved.push(attribute),
                Err(err) => {
                    tracing::warn!(attribute = %column.attribute, error = %err, "attribute skipped");
                    failures.insert(column.attribute.clone(), failure(&err));
                }
            }
        }
        for attribute in &roles.missing {
            let err = AuditError::Schema(format!("protected column not found: {attribute}"));
            tracing::warn!(attribute = %attribute, error = %err, "attribute skipped");
            failures.insert(attribute.clone(), failure(&err));
        }

        let original = evaluate_all(&MetricsEngine::new(&outcomes), &resolved, &failures);

        let reweighing: Option<Reweighing> = options
            .dataset_type
            .is_training()
            .then(|| reweigh(&resolved, &outcomes));
        let reweighed = reweighing.as_ref().map(|reweighing| {
            evaluate_all(
                &MetricsEngine::weighted(&outcomes, &reweighing.weights),
                &resolved,
                &failures,
            )
        });

        let tables = display_tables(&resolved, &outcomes);
        let report = assemble(options.dataset_type, original, reweighed, &tables)?;

        let summary = AuditSummary {
            rows: dataset.len(),
            rows_missing_outcome: outcomes.missing_rows(),
            favorable_labels: outcomes.favorable_labels.clone(),
            attributes_resolved: resolved.len(),
            attributes_failed: failures.len(),
            passthrough_columns: roles.passthrough.len(),
            reweighing_sweeps: reweighing.as_ref().map(|reweighing| reweighing.iterations),
            reweighing_converged: reweighing.as_ref().map(|reweighing| reweighing.converged),
            empty_cells: reweighing.as_ref().map(|reweighing| reweighing.empty_cells),
            duration_ms: started.elapsed().as_millis(),
        };

        tracing::info!(
            resolved = summary.attributes_resolved,
            failed = summary.attributes_failed,
            duration_ms = summary.duration_ms as u64,
            "audit finished"
        );

        Ok(AuditOutcome {
            report,
            weights: reweighing.map(|reweighing| reweighing.weights),
            summary,
        })
    }
}

fn failure(err: &AuditError) -> AttributeReport {
    AttributeReport::Failed(AttributeFailure {
        error: err.marker(),
    })
}

fn evaluate_all(
    engine: &MetricsEngine<'_>,
    resolved: &[ResolvedAttribute],
    failures: &BTreeMap<String, AttributeReport>,
) -> BTreeMap<String, AttributeReport> {
    let mut section = failures.clone();
    for attribute in resolved {
        section.insert(attribute.name.clone(), engine.evaluate(attribute));
    }
    section
}
