use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dataset::Value;

/// How a protected attribute is partitioned into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Privileged value against everything else.
    Binary,
    /// Named categories with a reference category for the overall metric.
    MultiLevel,
    /// Categories with a fixed canonical ordering.
    Ordinal,
}

impl AttributeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeKind::Binary => "binary",
            AttributeKind::MultiLevel => "multi_level",
            AttributeKind::Ordinal => "ordinal",
        }
    }
}

/// Declarative description of one protected attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeSpec {
    /// Attribute (column) name.
    pub name: String,
    pub kind: AttributeKind,
    /// Privileged value for binary attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<String>,
    /// Reference category for multi-level and ordinal attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Declared categories; for ordinal attributes, lowest to highest.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<String>,
    /// Display labels keyed by raw category code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Numeric binarization: values below the threshold are privileged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Alternate column spellings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl AttributeSpec {
    fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            privileged: None,
            reference: None,
            levels: Vec::new(),
            labels: BTreeMap::new(),
            threshold: None,
            aliases: Vec::new(),
        }
    }

    pub fn binary(name: impl Into<String>, privileged: Option<&str>) -> Self {
        let mut spec = Self::new(name, AttributeKind::Binary);
        spec.privileged = privileged.map(str::to_string);
        spec
    }

    pub fn multi_level(name: impl Into<String>, reference: Option<&str>, levels: &[&str]) -> Self {
        let mut spec = Self::new(name, AttributeKind::MultiLevel);
        spec.reference = reference.map(str::to_string);
        spec.levels = levels.iter().map(|level| level.to_string()).collect();
        spec
    }

    pub fn ordinal(name: impl Into<String>, reference: Option<&str>, levels: &[&str]) -> Self {
        let mut spec = Self::new(name, AttributeKind::Ordinal);
        spec.reference = reference.map(str::to_string);
        spec.levels = levels.iter().map(|level| level.to_string()).collect();
        spec
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|alias| alias.to_string()).collect();
        self
    }

    pub fn with_label(mut self, code: &str, label: &str) -> Self {
        self.labels.insert(code.to_string(), label.to_string());
        self
    }

    /// True when `name` refers to this attribute by name or alias.
    pub fn matches(&self, name: &str) -> bool {
        names_match(&self.name, name) || self.aliases.iter().any(|alias| names_match(alias, name))
    }

    /// Display label for a canonical category key. Label map codes are
    /// compared by their canonical key, so `"1.0"` labels the value `1`.
    pub fn label_for(&self, key: &str) -> String {
        if let Some(label) = self.labels.get(key) {
            return label.clone();
        }
        self.labels
            .iter()
            .find(|(code, _)| Value::parse(code).key().as_deref() == Some(key))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn with_codes(mut self, labels: &[&str]) -> Self {
        for (code, label) in labels.iter().enumerate() {
            self.labels.insert(code.to_string(), label.to_string());
        }
        self
    }

    /// Apply a caller-supplied reference value to whichever slot the kind uses.
    pub fn with_reference_override(mut self, value: &str) -> Self {
        match self.kind {
            AttributeKind::Binary => self.privileged = Some(value.to_string()),
            AttributeKind::MultiLevel | AttributeKind::Ordinal => {
                self.reference = Some(value.to_string())
            }
        }
        self
    }
}

/// Configuration table `attribute -> spec` consulted by group resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeCatalog {
    pub attributes: Vec<AttributeSpec>,
}

impl AttributeCatalog {
    pub fn new(attributes: Vec<AttributeSpec>) -> Self {
        Self { attributes }
    }

    /// Legacy dashboard conventions expressed as configuration data,
    /// including the numeric codes of pre-encoded uploads.
    pub fn conventional() -> Self {
        Self::new(vec![
            AttributeSpec::binary("Gender", Some("Male")).with_codes(&["Female", "Male"]),
            AttributeSpec::binary("Disability", Some("No"))
                .with_label("No", "No Disability")
                .with_label("Yes", "With Disability")
                .with_codes(&["With Disability", "No Disability"]),
            AttributeSpec::binary("Age", None)
                .with_threshold(40.0)
                .with_label("< 40", "Young (< 40)")
                .with_label(">= 40", "Old (>= 40)"),
            AttributeSpec::multi_level(
                "Race",
                Some("White"),
                &["Black", "Hispanic", "Asian", "White"],
            )
            .with_codes(&["Black", "Hispanic", "Asian", "White"]),
            AttributeSpec::ordinal(
                "Education",
                Some("PhD"),
                &["High School", "Bachelor", "Master", "PhD"],
            )
            .with_codes(&["High School", "Bachelor", "Master", "PhD"]),
            AttributeSpec::binary("Sexual Orientation", Some("Heterosexual"))
                .with_aliases(&["SexualOrientation"])
                .with_codes(&["LGBTQIA+", "Heterosexual"]),
            AttributeSpec::binary("Religion", None),
        ])
    }

    pub fn find(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|spec| spec.matches(name))
    }

    /// Catalog where `overrides` replace entries describing the same attribute.
    pub fn merged(&self, overrides: &[AttributeSpec]) -> Self {
        let mut attributes: Vec<AttributeSpec> = overrides.to_vec();
        for spec in &self.attributes {
            if !overrides.iter().any(|other| other.matches(&spec.name)) {
                attributes.push(spec.clone());
            }
        }
        Self { attributes }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Compare attribute or column names ignoring whitespace and ASCII case.
pub fn names_match(left: &str, right: &str) -> bool {
    let left = left.chars().filter(|ch| !ch.is_whitespace());
    let right = right.chars().filter(|ch| !ch.is_whitespace());
    left.map(|ch| ch.to_ascii_lowercase())
        .eq(right.map(|ch| ch.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_specs_by_alias_and_spacing() {
        let catalog = AttributeCatalog::conventional();
        let spec = catalog.find("SexualOrientation").expect("sexual orientation spec");
        assert_eq!(spec.privileged.as_deref(), Some("Heterosexual"));
        assert!(catalog.find("education").is_some());
        assert!(catalog.find("Income").is_none());
    }

    #[test]
    fn overrides_replace_catalog_entries() {
        let catalog = AttributeCatalog::conventional();
        let merged = catalog.merged(&[AttributeSpec::binary("Gender", Some("Female"))]);
        assert_eq!(merged.len(), catalog.len());
        assert_eq!(
            merged.find("Gender").and_then(|spec| spec.privileged.as_deref()),
            Some("Female")
        );
    }

    #[test]
    fn reference_override_targets_the_kind_slot() {
        let religion = AttributeSpec::binary("Religion", None).with_reference_override("Hindu");
        assert_eq!(religion.privileged.as_deref(), Some("Hindu"));
        let race = AttributeSpec::multi_level("Race", Some("White"), &[])
            .with_reference_override("Asian");
        assert_eq!(race.reference.as_deref(), Some("Asian"));
    }

    #[test]
    fn labels_fall_back_to_the_code() {
        let spec = AttributeSpec::binary("Disability", Some("No")).with_label("No", "No Disability");
        assert_eq!(spec.label_for("No"), "No Disability");
        assert_eq!(spec.label_for("Yes"), "Yes");
    }

    #[test]
    fn conventional_catalog_labels_numeric_codes() {
        let catalog = AttributeCatalog::conventional();
        let gender = catalog.find("Gender").expect("gender");
        assert_eq!(gender.label_for("1"), "Male");
        assert_eq!(gender.label_for("0"), "Female");
        let race = catalog.find("Race").expect("race");
        assert_eq!(race.label_for("3"), "White");
        let disability = catalog.find("Disability").expect("disability");
        assert_eq!(disability.label_for("1"), "No Disability");
        assert_eq!(disability.label_for("No"), "No Disability");
    }

    #[test]
    fn label_codes_are_compared_canonically() {
        let spec = AttributeSpec::binary("Flag", Some("1")).with_label("1.0", "Set");
        assert_eq!(spec.label_for("1"), "Set");
    }
}
