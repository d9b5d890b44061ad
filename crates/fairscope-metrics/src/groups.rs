use std::collections::{BTreeSet, HashMap};

use fairscope_core::dataset::{compare_keys, format_number};
use fairscope_core::{
    AttributeCatalog, AttributeKind, AttributeSpec, AuditError, AuditOptions, Dataset,
    ProtectedColumn, Result, Value, names_match,
};

use crate::outcome::Outcomes;

/// One named category of a protected attribute. Categories are identified
/// by their display label: raw values that share a label are one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    /// Display label from the attribute label map.
    pub label: String,
    /// Canonical keys of the raw values pooled under the label.
    pub codes: Vec<String>,
    /// Member rows, ascending.
    pub rows: Vec<usize>,
}

impl Category {
    fn new(spec: &AttributeSpec, code: String) -> Self {
        Self {
            label: spec.label_for(&code),
            codes: vec![code],
            rows: Vec::new(),
        }
    }

    fn answers_to(&self, code: &str, label: &str) -> bool {
        names_match(&self.label, label) || self.codes.iter().any(|known| names_match(known, code))
    }
}

/// Privileged vs unprivileged row sets.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPartition {
    pub privileged_label: String,
    pub privileged: Vec<usize>,
    pub unprivileged_label: String,
    pub unprivileged: Vec<usize>,
}

/// Group partition of one protected attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttribute {
    pub name: String,
    pub column: String,
    pub kind: AttributeKind,
    /// Categories in canonical order. For multi-level attributes the
    /// reference category is last.
    pub categories: Vec<Category>,
    /// Index of the privileged (binary) or reference category.
    pub reference: usize,
    /// Binary split, or the reference against all other categories pooled.
    pub partition: GroupPartition,
    /// Category index per row; `None` when the row is excluded.
    membership: Vec<Option<usize>>,
    /// Rows with a known outcome excluded from this attribute.
    pub excluded: usize,
}

impl ResolvedAttribute {
    pub fn reference_category(&self) -> &Category {
        &self.categories[self.reference]
    }

    pub fn category_of(&self, row: usize) -> Option<usize> {
        self.membership.get(row).copied().flatten()
    }

    /// Group used for reweighing strata: the binary side for binary
    /// attributes, the category for the others.
    pub fn stratum_of(&self, row: usize) -> Option<usize> {
        let category = self.category_of(row)?;
        match self.kind {
            AttributeKind::Binary => Some(usize::from(category != self.reference)),
            AttributeKind::MultiLevel | AttributeKind::Ordinal => Some(category),
        }
    }

    /// Unordered category pairs `(i, j)` with `i < j` in canonical order.
    /// Empty for binary attributes.
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        if self.kind == AttributeKind::Binary {
            return Vec::new();
        }
        let count = self.categories.len();
        (0..count)
            .flat_map(|i| (i + 1..count).map(move |j| (i, j)))
            .collect()
    }
}

/// Pick the spec describing `attribute`: the catalog entry when one exists,
/// otherwise a binary or multi-level spec inferred from the observed values.
/// Caller-supplied references take precedence over the catalog.
pub fn resolve_spec(
    dataset: &Dataset,
    column: &ProtectedColumn,
    options: &AuditOptions,
    catalog: &AttributeCatalog,
) -> AttributeSpec {
    let mut spec = match catalog.find(&column.attribute) {
        Some(spec) => spec.clone(),
        None => {
            let distinct: BTreeSet<String> = dataset
                .column(column.index)
                .values
                .iter()
                .filter_map(Value::key)
                .collect();
            if distinct.len() > 2 {
                AttributeSpec::multi_level(column.attribute.clone(), None, &[])
            } else {
                AttributeSpec::binary(column.attribute.clone(), None)
            }
        }
    };
    spec.name = column.attribute.clone();

    match options.reference_for(&column.attribute) {
        Some(value) => spec.with_reference_override(value),
        None => spec,
    }
}

/// Partition the rows of one protected attribute into groups.
///
/// Rows with a missing outcome or a missing attribute value are excluded from
/// this attribute only. Fails when fewer than two categories have members or
/// when no privileged/reference category can be determined.
pub fn resolve_attribute(
    dataset: &Dataset,
    column: &ProtectedColumn,
    spec: &AttributeSpec,
    outcomes: &Outcomes,
) -> Result<ResolvedAttribute> {
    let attribute = spec.name.as_str();
    let values = &dataset.column(column.index).values;

    let mut excluded = 0usize;
    let mut row_keys: Vec<Option<String>> = Vec::with_capacity(values.len());
    for (row, value) in values.iter().enumerate() {
        if !outcomes.is_known(row) {
            row_keys.push(None);
            continue;
        }
        let key = match spec.threshold {
            Some(threshold) => value.as_f64().map(|number| threshold_key(number, threshold)),
            None => value.key(),
        };
        if key.is_none() {
            excluded += 1;
        }
        row_keys.push(key);
    }

    let mut categories = declared_categories(spec)?;
    let observed: BTreeSet<&String> = row_keys.iter().flatten().collect();
    let mut observed: Vec<&String> = observed.into_iter().collect();
    observed.sort_by(|a, b| compare_keys(a, b));

    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for key in observed {
        let label = spec.label_for(key);
        let position = categories
            .iter()
            .position(|category| category.answers_to(key, &label));
        match (position, spec.kind) {
            (Some(position), _) => {
                let category = &mut categories[position];
                if !category.codes.iter().any(|code| code == key) {
                    tracing::debug!(
                        attribute,
                        value = %key,
                        label = %category.label,
                        "value pooled with a category of the same label"
                    );
                    category.codes.push(key.clone());
                }
                index_of.insert(key.as_str(), position);
            }
            (None, AttributeKind::Ordinal) => {
                tracing::warn!(attribute, value = %key, "value outside the ordinal scale excluded");
            }
            (None, _) if spec.threshold.is_some() => {}
            (None, _) => {
                categories.push(Category::new(spec, key.clone()));
                index_of.insert(key.as_str(), categories.len() - 1);
            }
        }
    }

    let mut membership = vec![None; values.len()];
    for (row, key) in row_keys.iter().enumerate() {
        let Some(key) = key else {
            continue;
        };
        match index_of.get(key.as_str()) {
            Some(&idx) => {
                categories[idx].rows.push(row);
                membership[row] = Some(idx);
            }
            None => excluded += 1,
        }
    }

    let populated = categories
        .iter()
        .filter(|category| !category.rows.is_empty())
        .count();
    if populated < 2 {
        return Err(AuditError::group_resolution(
            attribute,
            format!("only {populated} distinct non-missing value(s) observed; at least 2 are required"),
        ));
    }

    let mut reference = find_reference(spec, &categories)?;

    if spec.kind == AttributeKind::MultiLevel && reference + 1 != categories.len() {
        let moved = categories.remove(reference);
        categories.push(moved);
        let last = categories.len() - 1;
        for slot in membership.iter_mut().flatten() {
            *slot = match (*slot).cmp(&reference) {
                std::cmp::Ordering::Less => *slot,
                std::cmp::Ordering::Equal => last,
                std::cmp::Ordering::Greater => *slot - 1,
            };
        }
        reference = last;
    }

    let partition = build_partition(&categories, reference);

    tracing::debug!(
        attribute,
        kind = spec.kind.as_str(),
        categories = categories.len(),
        excluded,
        "attribute resolved"
    );

    Ok(ResolvedAttribute {
        name: attribute.to_string(),
        column: column.column.clone(),
        kind: spec.kind,
        categories,
        reference,
        partition,
        membership,
        excluded,
    })
}

fn declared_categories(spec: &AttributeSpec) -> Result<Vec<Category>> {
    let category = |code: String| Category::new(spec, code);

    if let Some(threshold) = spec.threshold {
        if spec.kind != AttributeKind::Binary {
            return Err(AuditError::group_resolution(
                &spec.name,
                "a numeric threshold is only valid for binary attributes",
            ));
        }
        return Ok(vec![
            category(threshold_key(threshold - 1.0, threshold)),
            category(threshold_key(threshold, threshold)),
        ]);
    }

    if spec.kind == AttributeKind::Ordinal && spec.levels.is_empty() {
        return Err(AuditError::group_resolution(
            &spec.name,
            "ordinal attributes require declared levels",
        ));
    }

    let mut categories: Vec<Category> = Vec::with_capacity(spec.levels.len());
    for code in spec.levels.iter().filter_map(|level| Value::parse(level).key()) {
        let label = spec.label_for(&code);
        if categories.iter().any(|known| known.answers_to(&code, &label)) {
            return Err(AuditError::group_resolution(
                &spec.name,
                format!("level '{code}' is declared twice"),
            ));
        }
        categories.push(category(code));
    }
    Ok(categories)
}

fn threshold_key(value: f64, threshold: f64) -> String {
    if value < threshold {
        format!("< {}", format_number(threshold))
    } else {
        format!(">= {}", format_number(threshold))
    }
}

fn find_reference(spec: &AttributeSpec, categories: &[Category]) -> Result<usize> {
    let wanted = match spec.kind {
        AttributeKind::Binary => spec.privileged.clone().or_else(|| {
            spec.threshold
                .map(|threshold| threshold_key(threshold - 1.0, threshold))
        }),
        AttributeKind::MultiLevel => spec.reference.clone(),
        AttributeKind::Ordinal => spec
            .reference
            .clone()
            .or_else(|| categories.last().map(|category| category.label.clone())),
    };

    let Some(wanted) = wanted else {
        let slot = if spec.kind == AttributeKind::Binary {
            "privileged value"
        } else {
            "reference category"
        };
        return Err(AuditError::group_resolution(
            &spec.name,
            format!("no {slot} configured; supply one in referenceCategories"),
        ));
    };

    let wanted_key = Value::parse(&wanted).key().unwrap_or_else(|| wanted.clone());
    let wanted_label = spec.label_for(&wanted_key);
    if let Some(position) = categories.iter().position(|category| {
        category.answers_to(&wanted_key, &wanted_label) || names_match(&category.label, &wanted)
    }) {
        return Ok(position);
    }

    let detail = match spec.kind {
        AttributeKind::Binary => format!("privileged value '{wanted}' is not observed"),
        AttributeKind::MultiLevel | AttributeKind::Ordinal => {
            format!("reference category '{wanted}' is neither declared nor observed")
        }
    };
    Err(AuditError::group_resolution(&spec.name, detail))
}

fn build_partition(categories: &[Category], reference: usize) -> GroupPartition {
    let privileged_category = &categories[reference];
    let others: Vec<&Category> = categories
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != reference)
        .map(|(_, category)| category)
        .collect();

    let unprivileged_label = match others.as_slice() {
        [single] => single.label.clone(),
        _ => format!("other than {}", privileged_category.label),
    };
    let mut unprivileged: Vec<usize> = others
        .iter()
        .flat_map(|category| category.rows.iter().copied())
        .collect();
    unprivileged.sort_unstable();

    GroupPartition {
        privileged_label: privileged_category.label.clone(),
        privileged: privileged_category.rows.clone(),
        unprivileged_label,
        unprivileged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::resolve_outcomes;
    use fairscope_core::{DatasetType, ErrorKind, load_csv};

    fn resolve(csv: &str, spec: AttributeSpec) -> Result<ResolvedAttribute> {
        let dataset = load_csv(csv).expect("dataset");
        let outcomes = resolve_outcomes(&dataset, 1, &[]).expect("outcomes");
        let column = ProtectedColumn {
            attribute: spec.name.clone(),
            column: dataset.column(0).name.clone(),
            index: 0,
        };
        resolve_attribute(&dataset, &column, &spec, &outcomes)
    }

    #[test]
    fn binary_pools_everything_but_the_privileged_value() {
        let resolved = resolve(
            "Religion,y\nChristian,1\nHindu,0\nMuslim,1\nChristian,0\n",
            AttributeSpec::binary("Religion", Some("Christian")),
        )
        .expect("resolved");
        assert_eq!(resolved.partition.privileged, vec![0, 3]);
        assert_eq!(resolved.partition.unprivileged, vec![1, 2]);
        assert_eq!(resolved.partition.unprivileged_label, "other than Christian");
        assert_eq!(resolved.stratum_of(2), Some(1));
        assert!(resolved.pairs().is_empty());
    }

    #[test]
    fn single_category_fails_resolution() {
        let err = resolve(
            "Gender,y\nMale,1\nMale,0\n,1\n",
            AttributeSpec::binary("Gender", Some("Male")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GroupResolution);
    }

    #[test]
    fn binary_without_privileged_value_fails() {
        let err = resolve("Flag,y\nA,1\nB,0\n", AttributeSpec::binary("Flag", None)).unwrap_err();
        assert!(err.to_string().contains("privileged value"));
    }

    #[test]
    fn missing_values_are_excluded_from_the_attribute_only() {
        let resolved = resolve(
            "Gender,y\nMale,1\n,0\nFemale,1\nFemale,\n",
            AttributeSpec::binary("Gender", Some("Male")),
        )
        .expect("resolved");
        assert_eq!(resolved.excluded, 1);
        assert_eq!(resolved.partition.unprivileged, vec![2]);
        assert_eq!(resolved.category_of(3), None);
    }

    #[test]
    fn threshold_binarizes_numeric_values() {
        let resolved = resolve(
            "Age,y\n25,1\n40,0\n61,1\nunknown,0\n",
            AttributeSpec::binary("Age", None).with_threshold(40.0),
        )
        .expect("resolved");
        assert_eq!(resolved.reference_category().codes, vec!["< 40".to_string()]);
        assert_eq!(resolved.partition.privileged, vec![0]);
        assert_eq!(resolved.partition.unprivileged, vec![1, 2]);
        assert_eq!(resolved.excluded, 1);
    }

    #[test]
    fn ordinal_pairs_follow_the_declared_scale() {
        let resolved = resolve(
            "Education,y\nPhD,1\nHigh School,0\nMaster,1\nBachelor,0\n",
            AttributeSpec::ordinal(
                "Education",
                Some("PhD"),
                &["High School", "Bachelor", "Master", "PhD"],
            ),
        )
        .expect("resolved");
        let labels: Vec<&str> = resolved
            .categories
            .iter()
            .map(|category| category.label.as_str())
            .collect();
        assert_eq!(labels, vec!["High School", "Bachelor", "Master", "PhD"]);
        assert_eq!(
            resolved.pairs(),
            vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
        );
        assert_eq!(resolved.reference, 3);
    }

    #[test]
    fn multi_level_moves_the_reference_last() {
        let resolved = resolve(
            "Race,y\nWhite,1\nAsian,0\nBlack,1\n",
            AttributeSpec::multi_level("Race", Some("White"), &[]),
        )
        .expect("resolved");
        let labels: Vec<&str> = resolved
            .categories
            .iter()
            .map(|category| category.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Asian", "Black", "White"]);
        assert_eq!(resolved.reference, 2);
        assert_eq!(resolved.category_of(0), Some(2));
        assert_eq!(resolved.category_of(1), Some(0));
        assert_eq!(resolved.partition.unprivileged, vec![1, 2]);
    }

    #[test]
    fn multi_level_without_reference_fails() {
        let err = resolve(
            "Race,y\nWhite,1\nAsian,0\nBlack,1\n",
            AttributeSpec::multi_level("Race", None, &[]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GroupResolution);
    }

    #[test]
    fn unobserved_privileged_value_fails() {
        let err = resolve(
            "Gender,y\nFemale,1\nNon-binary,0\nFemale,0\n",
            AttributeSpec::binary("Gender", Some("Male")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GroupResolution);
        assert!(err.to_string().contains("'Male' is not observed"));
    }

    #[test]
    fn coded_values_resolve_through_the_catalog_labels() {
        let catalog = AttributeCatalog::conventional();
        let gender = catalog.find("Gender").expect("gender").clone();
        let resolved = resolve("Gender,y\n1,1\n1,1\n0,0\n0,1\n", gender).expect("resolved");
        assert_eq!(resolved.partition.privileged_label, "Male");
        assert_eq!(resolved.partition.privileged, vec![0, 1]);
        assert_eq!(resolved.partition.unprivileged_label, "Female");
        assert_eq!(resolved.partition.unprivileged, vec![2, 3]);

        let race = catalog.find("Race").expect("race").clone();
        let resolved = resolve("Race,y\n3,1\n0,0\n2,1\nWhite,0\n", race).expect("resolved");
        let white = resolved.reference_category();
        assert_eq!(white.label, "White");
        assert_eq!(white.rows, vec![0, 3]);
        assert_eq!(resolved.categories.len(), 4);
    }

    #[test]
    fn values_sharing_a_label_are_one_category() {
        let spec = AttributeSpec::binary("Gender", Some("Male")).with_label("1", "Male");
        let resolved = resolve("Gender,y\n1,1\nMale,0\nFemale,1\n", spec).expect("resolved");
        assert_eq!(resolved.categories.len(), 2);
        let male = resolved.reference_category();
        assert_eq!(male.label, "Male");
        assert_eq!(male.rows, vec![0, 1]);
        assert_eq!(male.codes, vec!["1".to_string(), "Male".to_string()]);
        assert_eq!(resolved.partition.unprivileged_label, "Female");
    }

    #[test]
    fn inferred_spec_uses_caller_reference() {
        let dataset = load_csv("Region,y\nNorth,1\nSouth,0\nEast,1\n").expect("dataset");
        let column = ProtectedColumn {
            attribute: "Region".to_string(),
            column: "Region".to_string(),
            index: 0,
        };
        let options = AuditOptions::new("y", &["Region"], DatasetType::Training)
            .with_reference("Region", "North");
        let spec = resolve_spec(&dataset, &column, &options, &AttributeCatalog::default());
        assert_eq!(spec.kind, AttributeKind::MultiLevel);
        assert_eq!(spec.reference.as_deref(), Some("North"));
    }
}
