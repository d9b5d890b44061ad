use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeSpec, names_match};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::loader::load_records;

/// Whether the outcome column holds ground-truth labels or model predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DatasetType {
    /// Historical labels; reweighing is computed.
    #[serde(rename = "training")]
    Training,
    /// Model predictions; metrics only.
    #[serde(rename = "modelOutcome")]
    ModelOutcome,
}

impl DatasetType {
    pub fn is_training(self) -> bool {
        matches!(self, DatasetType::Training)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetType::Training => "training",
            DatasetType::ModelOutcome => "modelOutcome",
        }
    }
}

/// Column roles and resolution options for one audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditOptions {
    pub outcome_column: String,
    pub protected_attributes: Vec<String>,
    pub dataset_type: DatasetType,
    /// Privileged value (binary) or reference category (multi-level) per attribute.
    #[serde(default)]
    pub reference_categories: BTreeMap<String, String>,
    /// Favorable outcome values; inferred from the data when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positive_labels: Vec<String>,
    /// Attribute specs that take precedence over the configured catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeSpec>,
}

impl AuditOptions {
    pub fn new(
        outcome_column: impl Into<String>,
        protected_attributes: &[&str],
        dataset_type: DatasetType,
    ) -> Self {
        Self {
            outcome_column: outcome_column.into(),
            protected_attributes: protected_attributes
                .iter()
                .map(|name| name.to_string())
                .collect(),
            dataset_type,
            reference_categories: BTreeMap::new(),
            positive_labels: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_reference(mut self, attribute: &str, value: &str) -> Self {
        self.reference_categories
            .insert(attribute.to_string(), value.to_string());
        self
    }

    pub fn with_attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    /// Caller-supplied reference for an attribute, matched like column names.
    pub fn reference_for(&self, attribute: &str) -> Option<&str> {
        self.reference_categories
            .iter()
            .find(|(name, _)| names_match(name, attribute))
            .map(|(_, value)| value.as_str())
    }
}

/// Boundary input: records plus column-role metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AuditRequest {
    pub rows: Vec<BTreeMap<String, serde_json::Value>>,
    #[serde(flatten)]
    pub options: AuditOptions,
}

impl AuditRequest {
    /// Build a request carrying every record of `dataset`.
    pub fn from_dataset(dataset: &Dataset, options: AuditOptions) -> Self {
        let rows = (0..dataset.len())
            .map(|row| {
                dataset
                    .columns()
                    .iter()
                    .map(|column| (column.name.clone(), column.values[row].to_json()))
                    .collect()
            })
            .collect();
        Self { rows, options }
    }

    /// Materialize the records into a dataset, keeping the options.
    pub fn into_parts(self) -> Result<(Dataset, AuditOptions)> {
        let dataset = load_records(&self.rows)?;
        Ok((dataset, self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_boundary_field_names() {
        let json = serde_json::json!({
            "rows": [{"Gender": "Male", "Outcome": "Approved"}],
            "outcomeColumn": "Outcome",
            "protectedAttributes": ["Gender"],
            "datasetType": "modelOutcome",
            "referenceCategories": {"Religion": "Christian"}
        });
        let request: AuditRequest = serde_json::from_value(json).expect("parse request");
        assert_eq!(request.options.dataset_type, DatasetType::ModelOutcome);
        assert_eq!(request.options.reference_for("religion"), Some("Christian"));
        assert!(request.options.positive_labels.is_empty());
    }

    #[test]
    fn from_dataset_keeps_every_cell() {
        let dataset = crate::loader::load_csv("Gender,Outcome\nMale,1\n,0\n").expect("dataset");
        let options = AuditOptions::new("Outcome", &["Gender"], DatasetType::Training);
        let request = AuditRequest::from_dataset(&dataset, options);
        assert_eq!(request.rows.len(), 2);
        assert!(request.rows[1]["Gender"].is_null());
        assert_eq!(request.rows[0]["Outcome"], serde_json::json!(1.0));

        let (restored, _) = request.into_parts().expect("restore");
        assert_eq!(restored.len(), 2);
        assert!(restored.value(0, 1).is_missing());
    }
}
