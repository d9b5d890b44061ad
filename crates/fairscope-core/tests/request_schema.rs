use fairscope_core::{
    DatasetType, ErrorKind, parse_request_json, report_json_schema, validate_request_json,
};

fn sample_request() -> serde_json::Value {
    serde_json::json!({
        "rows": [
            {"Gender": "Male", "Race": "White", "Outcome": "Approved"},
            {"Gender": "Female", "Race": "Black", "Outcome": "Denied"}
        ],
        "outcomeColumn": "Outcome",
        "protectedAttributes": ["Gender", "Race"],
        "datasetType": "training",
        "referenceCategories": {"Race": "White"},
        "attributes": [
            {"name": "Gender", "kind": "binary", "privileged": "Male"}
        ]
    })
}

#[test]
fn sample_request_validates_against_schema() {
    let issues = validate_request_json(&sample_request()).expect("compile schema");
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");

    let request = parse_request_json(sample_request()).expect("parse request");
    assert_eq!(request.options.dataset_type, DatasetType::Training);
    assert_eq!(request.rows.len(), 2);

    let (dataset, options) = request.into_parts().expect("materialize dataset");
    assert_eq!(dataset.len(), 2);
    assert_eq!(options.protected_attributes.len(), 2);
}

#[test]
fn request_without_outcome_column_is_rejected() {
    let mut request = sample_request();
    request
        .as_object_mut()
        .expect("object")
        .remove("outcomeColumn");

    let issues = validate_request_json(&request).expect("compile schema");
    assert!(!issues.is_empty());

    let err = parse_request_json(request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn unknown_dataset_type_is_rejected() {
    let mut request = sample_request();
    request["datasetType"] = serde_json::json!("validation");
    let err = parse_request_json(request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn report_schema_names_top_level_sections() {
    let schema = serde_json::to_value(report_json_schema()).expect("serialize schema");
    let properties = schema
        .get("properties")
        .and_then(|value| value.as_object())
        .expect("properties");
    assert!(properties.contains_key("original"));
    assert!(properties.contains_key("reweighed"));
    assert!(properties.contains_key("datasetType"));
}
