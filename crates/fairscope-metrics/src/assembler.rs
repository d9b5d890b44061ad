use std::collections::BTreeMap;
use std::sync::Arc;

use fairscope_core::{
    AttributeReport, AuditError, BiasReport, DatasetType, MetricSet, OutcomeRateTable,
    OutcomeRates, RESERVED_KEYS, RawCounts, RawDataTable, Result,
};

use crate::groups::ResolvedAttribute;
use crate::metrics::MetricsEngine;
use crate::outcome::Outcomes;

/// Display-only tables shared by the original and reweighed sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayTables {
    pub outcome_rates: Arc<OutcomeRateTable>,
    pub raw_data: Arc<RawDataTable>,
}

/// Unweighted outcome rates and approval counts per attribute and category.
pub fn display_tables(attributes: &[ResolvedAttribute], outcomes: &Outcomes) -> DisplayTables {
    let engine = MetricsEngine::new(outcomes);
    let mut outcome_rates = OutcomeRateTable::new();
    let mut raw_data = RawDataTable::new();

    for attribute in attributes {
        let mut groups = BTreeMap::new();
        let mut counts = BTreeMap::new();
        for category in &attribute.categories {
            let tally = engine.tally(&category.rows);
            groups.insert(category.label.clone(), tally.rate());
            counts.insert(
                category.label.clone(),
                RawCounts {
                    approved: tally.favorable,
                    total: tally.size,
                },
            );
        }

        outcome_rates.insert(
            attribute.name.clone(),
            OutcomeRates {
                privileged: engine.tally(&attribute.partition.privileged).rate(),
                unprivileged: engine.tally(&attribute.partition.unprivileged).rate(),
                groups,
            },
        );
        raw_data.insert(attribute.name.clone(), counts);
    }

    DisplayTables {
        outcome_rates: Arc::new(outcome_rates),
        raw_data: Arc::new(raw_data),
    }
}

/// Assemble the final report.
///
/// The reweighed section is kept only for training datasets. Fails when an
/// attribute name collides with a reserved report key or any metric is not
/// finite.
pub fn assemble(
    dataset_type: DatasetType,
    original: BTreeMap<String, AttributeReport>,
    reweighed: Option<BTreeMap<String, AttributeReport>>,
    tables: &DisplayTables,
) -> Result<BiasReport> {
    let reweighed = if dataset_type.is_training() {
        reweighed
    } else {
        None
    };

    check_section("original", &original)?;
    if let Some(section) = &reweighed {
        check_section("reweighed", section)?;
    }

    let section = |attributes| MetricSet {
        attributes,
        outcome_rates: Arc::clone(&tables.outcome_rates),
        raw_data: Arc::clone(&tables.raw_data),
    };

    Ok(BiasReport {
        original: section(original),
        reweighed: reweighed.map(section),
        dataset_type,
    })
}

fn check_section(section: &str, attributes: &BTreeMap<String, AttributeReport>) -> Result<()> {
    for (name, report) in attributes {
        if RESERVED_KEYS.contains(&name.as_str()) {
            return Err(AuditError::Serialization(format!(
                "attribute name '{name}' collides with a reserved report key"
            )));
        }
        if report.results().iter().any(|result| !result.is_finite()) {
            return Err(AuditError::Serialization(format!(
                "non-finite metric for attribute '{name}' in {section} section"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairscope_core::{ErrorKind, GroupStats, MetricResult};

    fn result(spd: f64) -> AttributeReport {
        let stats = |group: &str| GroupStats {
            group: group.to_string(),
            size: 1,
            favorable: 1,
            weighted_size: None,
            weighted_favorable: None,
            favorable_rate: Some(1.0),
        };
        AttributeReport::Binary(MetricResult {
            statistical_parity_difference: Some(spd),
            disparate_impact: Some(1.0),
            privileged: stats("a"),
            unprivileged: stats("b"),
        })
    }

    #[test]
    fn model_outcome_drops_reweighed_section() {
        let original = BTreeMap::from([("Gender".to_string(), result(0.0))]);
        let report = assemble(
            DatasetType::ModelOutcome,
            original.clone(),
            Some(original),
            &DisplayTables::default(),
        )
        .expect("report");
        assert!(report.reweighed.is_none());
        let json = serde_json::to_value(&report).expect("json");
        assert!(json["reweighed"].is_null());
        assert_eq!(json["datasetType"], "modelOutcome");
    }

    #[test]
    fn reserved_attribute_names_are_rejected() {
        let original = BTreeMap::from([("raw_data".to_string(), result(0.0))]);
        let err = assemble(DatasetType::Training, original, None, &DisplayTables::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn non_finite_metrics_are_rejected() {
        let original = BTreeMap::from([("Gender".to_string(), result(f64::NAN))]);
        let err = assemble(DatasetType::Training, original, None, &DisplayTables::default())
            .unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }
}
