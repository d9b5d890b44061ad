use std::collections::BTreeMap;

use fairscope_core::{
    AggregateMetrics, AttributeKind, AttributeReport, GroupStats, MetricResult,
};

use crate::groups::ResolvedAttribute;
use crate::outcome::Outcomes;

/// Weighted positive-outcome tally for a set of rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupTally {
    pub size: u64,
    pub favorable: u64,
    pub weight: f64,
    pub favorable_weight: f64,
}

impl GroupTally {
    /// `None` when the group is empty or carries no weight.
    pub fn rate(&self) -> Option<f64> {
        if self.size == 0 || self.weight <= 0.0 {
            None
        } else {
            Some(self.favorable_weight / self.weight)
        }
    }
}

/// Computes statistical parity difference and disparate impact, optionally
/// under per-record weights.
#[derive(Debug, Clone, Copy)]
pub struct MetricsEngine<'a> {
    outcomes: &'a Outcomes,
    weights: Option<&'a [f64]>,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(outcomes: &'a Outcomes) -> Self {
        Self {
            outcomes,
            weights: None,
        }
    }

    pub fn weighted(outcomes: &'a Outcomes, weights: &'a [f64]) -> Self {
        Self {
            outcomes,
            weights: Some(weights),
        }
    }

    fn weight(&self, row: usize) -> f64 {
        self.weights
            .and_then(|weights| weights.get(row).copied())
            .unwrap_or(1.0)
    }

    /// Rows with a missing outcome do not count.
    pub fn tally(&self, rows: &[usize]) -> GroupTally {
        let mut tally = GroupTally {
            size: 0,
            favorable: 0,
            weight: 0.0,
            favorable_weight: 0.0,
        };
        for &row in rows {
            let Some(favorable) = self.outcomes.get(row) else {
                continue;
            };
            let weight = self.weight(row);
            tally.size += 1;
            tally.weight += weight;
            if favorable {
                tally.favorable += 1;
                tally.favorable_weight += weight;
            }
        }
        tally
    }

    pub fn group_stats(&self, label: &str, rows: &[usize]) -> GroupStats {
        let tally = self.tally(rows);
        let weighted = self.weights.is_some();
        GroupStats {
            group: label.to_string(),
            size: tally.size,
            favorable: tally.favorable,
            weighted_size: weighted.then_some(tally.weight),
            weighted_favorable: weighted.then_some(tally.favorable_weight),
            favorable_rate: tally.rate(),
        }
    }

    /// Compare an unprivileged group against a privileged one.
    pub fn compare(
        &self,
        privileged_label: &str,
        privileged_rows: &[usize],
        unprivileged_label: &str,
        unprivileged_rows: &[usize],
    ) -> MetricResult {
        let privileged = self.group_stats(privileged_label, privileged_rows);
        let unprivileged = self.group_stats(unprivileged_label, unprivileged_rows);
        let (spd, di) = parity(privileged.favorable_rate, unprivileged.favorable_rate);
        MetricResult {
            statistical_parity_difference: spd,
            disparate_impact: di,
            privileged,
            unprivileged,
        }
    }

    /// Metrics for one resolved attribute: a single binary comparison, or the
    /// overall comparison plus every unordered pair of categories.
    pub fn evaluate(&self, attribute: &ResolvedAttribute) -> AttributeReport {
        let partition = &attribute.partition;
        let overall = self.compare(
            &partition.privileged_label,
            &partition.privileged,
            &partition.unprivileged_label,
            &partition.unprivileged,
        );

        if attribute.kind == AttributeKind::Binary {
            return AttributeReport::Binary(overall);
        }

        let mut group_metrics: BTreeMap<String, BTreeMap<String, MetricResult>> = BTreeMap::new();
        for (i, j) in attribute.pairs() {
            let unprivileged = &attribute.categories[i];
            let privileged = &attribute.categories[j];
            let result = self.compare(
                &privileged.label,
                &privileged.rows,
                &unprivileged.label,
                &unprivileged.rows,
            );
            group_metrics
                .entry(unprivileged.label.clone())
                .or_default()
                .insert(privileged.label.clone(), result);
        }

        AttributeReport::Aggregate(AggregateMetrics {
            kind: attribute.kind,
            reference: attribute.reference_category().label.clone(),
            categories: attribute
                .categories
                .iter()
                .map(|category| category.label.clone())
                .collect(),
            overall,
            group_metrics,
        })
    }
}

/// `(SPD, DI)` from the two rates. Both are absent when a group is empty;
/// DI is also absent when the privileged rate is zero.
pub fn parity(privileged: Option<f64>, unprivileged: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (privileged, unprivileged) {
        (Some(privileged), Some(unprivileged)) => {
            let spd = unprivileged - privileged;
            let di = (privileged > 0.0).then(|| unprivileged / privileged);
            (Some(spd), di)
        }
        _ => (None, None),
    }
}
