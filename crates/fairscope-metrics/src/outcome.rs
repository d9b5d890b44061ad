use std::collections::BTreeSet;

use fairscope_core::dataset::compare_keys;
use fairscope_core::{AuditError, Dataset, Result, Value, names_match};

/// Textual outcome values treated as favorable when no label is configured.
const FAVORABLE_TOKENS: [&str; 9] = [
    "approved", "accepted", "yes", "true", "positive", "granted", "hired", "pass", "passed",
];

/// Per-record favorable flag for the outcome column.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcomes {
    favorable: Vec<Option<bool>>,
    /// Canonical outcome keys counted as favorable.
    pub favorable_labels: Vec<String>,
}

impl Outcomes {
    /// Build directly from per-record flags; `None` marks a missing outcome.
    pub fn from_flags(favorable: Vec<Option<bool>>, favorable_labels: Vec<String>) -> Self {
        Self {
            favorable,
            favorable_labels,
        }
    }

    pub fn len(&self) -> usize {
        self.favorable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorable.is_empty()
    }

    /// `Some(true)` for a favorable outcome, `None` when the outcome is missing.
    pub fn get(&self, row: usize) -> Option<bool> {
        self.favorable.get(row).copied().flatten()
    }

    pub fn is_known(&self, row: usize) -> bool {
        self.get(row).is_some()
    }

    pub fn known_rows(&self) -> usize {
        self.favorable.iter().filter(|flag| flag.is_some()).count()
    }

    pub fn missing_rows(&self) -> usize {
        self.len() - self.known_rows()
    }
}

/// Resolve which outcome values are favorable.
///
/// Explicit labels win. Without them, a numeric outcome uses its maximal
/// value and a textual outcome uses the true-like tokens that are present.
pub fn resolve_outcomes(
    dataset: &Dataset,
    outcome_index: usize,
    positive_labels: &[String],
) -> Result<Outcomes> {
    let column = dataset.column(outcome_index);
    let observed: BTreeSet<String> = column.values.iter().filter_map(Value::key).collect();
    if observed.is_empty() {
        return Err(AuditError::Schema(format!(
            "outcome column '{}' has no values",
            column.name
        )));
    }

    let favorable_labels = if positive_labels.is_empty() {
        infer_favorable(&column.name, &column.values, &observed)?
    } else {
        let wanted: Vec<String> = positive_labels
            .iter()
            .filter_map(|label| Value::parse(label).key())
            .collect();
        let matched: Vec<String> = observed
            .iter()
            .filter(|key| wanted.iter().any(|label| names_match(label, key)))
            .cloned()
            .collect();
        if matched.is_empty() {
            tracing::warn!(
                column = %column.name,
                labels = ?positive_labels,
                "no favorable outcome label observed"
            );
        }
        matched
    };

    let favorable = column
        .values
        .iter()
        .map(|value| {
            value
                .key()
                .map(|key| favorable_labels.iter().any(|label| *label == key))
        })
        .collect();

    Ok(Outcomes {
        favorable,
        favorable_labels,
    })
}

fn infer_favorable(
    column: &str,
    values: &[Value],
    observed: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let numeric = values
        .iter()
        .filter(|value| !value.is_missing())
        .all(|value| value.as_f64().is_some());
    if numeric {
        let max = observed
            .iter()
            .max_by(|a, b| compare_keys(a, b))
            .cloned()
            .into_iter()
            .collect();
        return Ok(max);
    }

    let matched: Vec<String> = observed
        .iter()
        .filter(|key| {
            FAVORABLE_TOKENS
                .iter()
                .any(|token| key.eq_ignore_ascii_case(token))
        })
        .cloned()
        .collect();
    if matched.is_empty() {
        return Err(AuditError::Schema(format!(
            "cannot infer the favorable value of outcome column '{column}'; configure positive labels"
        )));
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairscope_core::load_csv;

    #[test]
    fn numeric_outcomes_favor_the_maximum() {
        let dataset = load_csv("id,y\na,0\nb,1.0\nc,NA\nd,1\n").expect("dataset");
        let outcomes = resolve_outcomes(&dataset, 1, &[]).expect("outcomes");
        assert_eq!(outcomes.favorable_labels, vec!["1".to_string()]);
        assert_eq!(outcomes.get(0), Some(false));
        assert_eq!(outcomes.get(1), Some(true));
        assert_eq!(outcomes.get(2), None);
        assert_eq!(outcomes.missing_rows(), 1);
    }

    #[test]
    fn textual_outcomes_use_true_like_tokens() {
        let dataset = load_csv("y\nApproved\nDenied\n").expect("dataset");
        let outcomes = resolve_outcomes(&dataset, 0, &[]).expect("outcomes");
        assert_eq!(outcomes.get(0), Some(true));
        assert_eq!(outcomes.get(1), Some(false));
    }

    #[test]
    fn explicit_labels_override_inference() {
        let dataset = load_csv("y\nlow\nhigh\n").expect("dataset");
        let outcomes = resolve_outcomes(&dataset, 0, &["High".to_string()]).expect("outcomes");
        assert_eq!(outcomes.get(0), Some(false));
        assert_eq!(outcomes.get(1), Some(true));
    }

    #[test]
    fn uninferrable_outcome_is_a_schema_error() {
        let dataset = load_csv("y\nlow\nhigh\n").expect("dataset");
        let err = resolve_outcomes(&dataset, 0, &[]).unwrap_err();
        assert!(matches!(err, AuditError::Schema(_)));
    }
}
