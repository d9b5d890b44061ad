use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::attributes::AttributeKind;
use crate::error::ErrorMarker;
use crate::request::DatasetType;

/// Size and favorable-outcome tally for one compared group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupStats {
    /// Display label of the group.
    pub group: String,
    pub size: u64,
    pub favorable: u64,
    /// Sum of record weights, present for reweighed metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_size: Option<f64>,
    /// Sum of favorable record weights, present for reweighed metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_favorable: Option<f64>,
    /// Positive-outcome rate; null for an empty group.
    pub favorable_rate: Option<f64>,
}

/// Group-fairness metrics for one privileged/unprivileged comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricResult {
    /// `rate(unprivileged) - rate(privileged)`; null when a group is empty.
    pub statistical_parity_difference: Option<f64>,
    /// `rate(unprivileged) / rate(privileged)`; null when a group is empty or
    /// the privileged rate is zero.
    pub disparate_impact: Option<f64>,
    pub privileged: GroupStats,
    pub unprivileged: GroupStats,
}

impl MetricResult {
    fn numbers(&self) -> [Option<f64>; 8] {
        [
            self.statistical_parity_difference,
            self.disparate_impact,
            self.privileged.weighted_size,
            self.privileged.weighted_favorable,
            self.privileged.favorable_rate,
            self.unprivileged.weighted_size,
            self.unprivileged.weighted_favorable,
            self.unprivileged.favorable_rate,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.numbers()
            .iter()
            .flatten()
            .all(|value| value.is_finite())
    }
}

/// Metrics for a multi-level or ordinal attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregateMetrics {
    pub kind: AttributeKind,
    /// Reference category label used as the privileged group in `overall`.
    pub reference: String,
    /// Category labels in canonical order.
    pub categories: Vec<String>,
    /// Reference category against all other categories pooled.
    pub overall: MetricResult,
    /// `group_metrics[a][b]`: `a` precedes `b` in canonical order, `b` is the
    /// privileged side. Each unordered pair appears exactly once.
    pub group_metrics: BTreeMap<String, BTreeMap<String, MetricResult>>,
}

impl AggregateMetrics {
    pub fn pair_count(&self) -> usize {
        self.group_metrics.values().map(BTreeMap::len).sum()
    }

    pub fn results(&self) -> impl Iterator<Item = &MetricResult> {
        std::iter::once(&self.overall).chain(
            self.group_metrics
                .values()
                .flat_map(|inner| inner.values()),
        )
    }
}

/// Error marker standing in for an attribute that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeFailure {
    pub error: ErrorMarker,
}

/// Per-attribute entry of a metric set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AttributeReport {
    Failed(AttributeFailure),
    Aggregate(AggregateMetrics),
    Binary(MetricResult),
}

impl AttributeReport {
    /// The metric summarizing the attribute: the binary result or `overall`.
    pub fn headline(&self) -> Option<&MetricResult> {
        match self {
            AttributeReport::Binary(result) => Some(result),
            AttributeReport::Aggregate(aggregate) => Some(&aggregate.overall),
            AttributeReport::Failed(_) => None,
        }
    }

    pub fn results(&self) -> Vec<&MetricResult> {
        match self {
            AttributeReport::Binary(result) => vec![result],
            AttributeReport::Aggregate(aggregate) => aggregate.results().collect(),
            AttributeReport::Failed(_) => Vec::new(),
        }
    }
}

/// Display-only positive-outcome rates for an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutcomeRates {
    pub privileged: Option<f64>,
    pub unprivileged: Option<f64>,
    /// Rate per category label.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Option<f64>>,
}

/// Raw approval counts for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RawCounts {
    pub approved: u64,
    pub total: u64,
}

pub type OutcomeRateTable = BTreeMap<String, OutcomeRates>;
pub type RawDataTable = BTreeMap<String, BTreeMap<String, RawCounts>>;

/// Metrics for every protected attribute plus display tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricSet {
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttributeReport>,
    pub outcome_rates: Arc<OutcomeRateTable>,
    pub raw_data: Arc<RawDataTable>,
}

/// Top-level audit result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BiasReport {
    pub original: MetricSet,
    /// Present only for training datasets.
    pub reweighed: Option<MetricSet>,
    #[serde(rename = "datasetType")]
    pub dataset_type: DatasetType,
}
