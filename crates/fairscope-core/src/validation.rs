use crate::attributes::{AttributeCatalog, names_match};
use crate::dataset::Dataset;
use crate::error::{AuditError, Result};
use crate::request::AuditOptions;

/// A protected attribute matched to a dataset column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedColumn {
    /// Attribute name as declared by the caller.
    pub attribute: String,
    /// Column name as present in the dataset header.
    pub column: String,
    pub index: usize,
}

/// Validated classification of dataset columns.
#[derive(Debug, Clone)]
pub struct ColumnRoles {
    pub outcome: String,
    pub outcome_index: usize,
    pub protected: Vec<ProtectedColumn>,
    /// Declared protected attributes with no matching column. Reported per
    /// attribute instead of failing the whole audit.
    pub missing: Vec<String>,
    pub passthrough: Vec<String>,
}

/// Validate the role assignment against the dataset header.
///
/// This checks:
/// - the dataset has at least one data row
/// - the outcome column exists and is not also protected
/// - at least one protected attribute is declared, without duplicates
pub fn validate_roles(
    dataset: &Dataset,
    options: &AuditOptions,
    catalog: &AttributeCatalog,
) -> Result<ColumnRoles> {
    if dataset.is_empty() {
        return Err(AuditError::Schema("dataset has zero data rows".to_string()));
    }

    if options.protected_attributes.is_empty() {
        return Err(AuditError::Schema(
            "at least one protected attribute must be selected".to_string(),
        ));
    }

    let outcome_index = dataset
        .column_index(&options.outcome_column)
        .ok_or_else(|| {
            AuditError::Schema(format!(
                "outcome column not found: {}",
                options.outcome_column
            ))
        })?;
    let outcome = dataset.column(outcome_index).name.clone();

    let mut protected: Vec<ProtectedColumn> = Vec::new();
    let mut missing = Vec::new();
    for (idx, attribute) in options.protected_attributes.iter().enumerate() {
        if options.protected_attributes[..idx]
            .iter()
            .any(|earlier| names_match(earlier, attribute))
        {
            return Err(AuditError::Schema(format!(
                "protected attribute declared twice: {attribute}"
            )));
        }

        let index = dataset.column_index(attribute).or_else(|| {
            catalog.find(attribute).and_then(|spec| {
                std::iter::once(&spec.name)
                    .chain(spec.aliases.iter())
                    .find_map(|name| dataset.column_index(name))
            })
        });

        match index {
            Some(index) if index == outcome_index => {
                return Err(AuditError::Schema(format!(
                    "outcome column '{outcome}' cannot also be protected"
                )));
            }
            Some(index) => protected.push(ProtectedColumn {
                attribute: attribute.clone(),
                column: dataset.column(index).name.clone(),
                index,
            }),
            None => missing.push(attribute.clone()),
        }
    }

    let passthrough = dataset
        .column_names()
        .enumerate()
        .filter(|(idx, _)| {
            *idx != outcome_index && !protected.iter().any(|column| column.index == *idx)
        })
        .map(|(_, name)| name.to_string())
        .collect();

    Ok(ColumnRoles {
        outcome,
        outcome_index,
        protected,
        missing,
        passthrough,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_csv;
    use crate::request::DatasetType;

    fn dataset() -> Dataset {
        load_csv("Gender,SexualOrientation,Income,Outcome\nMale,Gay,10,Approved\n")
            .expect("dataset")
    }

    #[test]
    fn classifies_columns() {
        let options = AuditOptions::new(
            "Outcome",
            &["Gender", "Sexual Orientation", "Religion"],
            DatasetType::Training,
        );
        let roles = validate_roles(&dataset(), &options, &AttributeCatalog::conventional())
            .expect("roles");
        assert_eq!(roles.outcome, "Outcome");
        assert_eq!(roles.protected.len(), 2);
        assert_eq!(roles.protected[1].column, "SexualOrientation");
        assert_eq!(roles.missing, vec!["Religion".to_string()]);
        assert_eq!(roles.passthrough, vec!["Income".to_string()]);
    }

    #[test]
    fn missing_outcome_is_fatal() {
        let options = AuditOptions::new("Label", &["Gender"], DatasetType::Training);
        let err = validate_roles(&dataset(), &options, &AttributeCatalog::default()).unwrap_err();
        assert!(matches!(err, AuditError::Schema(_)));
    }

    #[test]
    fn outcome_cannot_be_protected() {
        let options = AuditOptions::new("Outcome", &["Outcome"], DatasetType::Training);
        assert!(validate_roles(&dataset(), &options, &AttributeCatalog::default()).is_err());
    }

    #[test]
    fn requires_a_protected_attribute() {
        let options = AuditOptions::new("Outcome", &[], DatasetType::Training);
        assert!(validate_roles(&dataset(), &options, &AttributeCatalog::default()).is_err());
    }

    #[test]
    fn rejects_empty_dataset() {
        let empty = load_csv("Gender,Outcome\n").expect("header only");
        let options = AuditOptions::new("Outcome", &["Gender"], DatasetType::Training);
        let err = validate_roles(&empty, &options, &AttributeCatalog::default()).unwrap_err();
        assert!(err.to_string().contains("zero data rows"));
    }
}
