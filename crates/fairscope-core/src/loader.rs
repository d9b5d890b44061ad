use std::collections::{BTreeMap, BTreeSet};

use crate::dataset::{Dataset, Value};
use crate::error::{AuditError, Result};

/// Parse comma-separated text with a header row into a dataset.
///
/// A UTF-8 byte-order mark on the first header is dropped and cells are
/// coerced with [`Value::parse`]; the cell text itself is kept for export.
/// No row is dropped for missing values.
pub fn load_csv(text: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let header = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let name = if idx == 0 {
                name.trim_start_matches('\u{feff}')
            } else {
                name
            };
            name.trim().to_string()
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Dataset::from_text_rows(header, rows)
}

/// Build a dataset from JSON records. Every record must carry the same keys.
pub fn load_records(records: &[BTreeMap<String, serde_json::Value>]) -> Result<Dataset> {
    let Some(first) = records.first() else {
        return Err(AuditError::Schema("dataset has zero data rows".to_string()));
    };

    let header = first
        .keys()
        .map(|key| key.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();
    let expected = first.keys().collect::<BTreeSet<_>>();

    let mut rows = Vec::with_capacity(records.len());
    for (row_idx, record) in records.iter().enumerate() {
        let keys = record.keys().collect::<BTreeSet<_>>();
        if keys != expected {
            return Err(AuditError::Schema(format!(
                "record {} does not match the header column set",
                row_idx + 1
            )));
        }
        rows.push(
            first
                .keys()
                .map(|key| (Value::from_json(&record[key]), json_text(&record[key])))
                .collect(),
        );
    }

    Dataset::from_cells(header, rows)
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn strips_bom_and_coerces_values() {
        let dataset = load_csv("\u{feff}Gender,Age,Outcome\nMale,35,Approved\nFemale,,Denied\n")
            .expect("load csv");
        let names: Vec<&str> = dataset.column_names().collect();
        assert_eq!(names, vec!["Gender", "Age", "Outcome"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.value(1, 0), &Value::Number(35.0));
        assert_eq!(dataset.value(1, 1), &Value::Missing);
        assert_eq!(dataset.column(1).raw_text(0), "35");
    }

    #[test]
    fn records_keep_string_cells_verbatim() {
        let mut record = BTreeMap::new();
        record.insert("Account".to_string(), serde_json::json!("00123"));
        record.insert("Outcome".to_string(), serde_json::json!(1));
        let dataset = load_records(&[record]).expect("record");
        assert_eq!(dataset.value(0, 0), &Value::Number(123.0));
        assert_eq!(dataset.column(0).raw_text(0), "00123");
        assert_eq!(dataset.column(1).raw_text(0), "1");
    }

    #[test]
    fn ragged_csv_is_a_schema_error() {
        let err = load_csv("a,b\n1,2\n3\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn records_must_share_columns() {
        let mut first = BTreeMap::new();
        first.insert("Gender".to_string(), serde_json::json!("Male"));
        first.insert("Outcome".to_string(), serde_json::json!(1));
        let mut second = BTreeMap::new();
        second.insert("Gender".to_string(), serde_json::json!("Female"));

        let err = load_records(&[first.clone(), second]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);

        let dataset = load_records(&[first]).expect("single record");
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn zero_records_is_a_schema_error() {
        let err = load_records(&[]).unwrap_err();
        assert!(matches!(err, AuditError::Schema(_)));
    }
}
