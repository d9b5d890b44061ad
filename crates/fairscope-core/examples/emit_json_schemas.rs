use fairscope_core::{report_json_schema, request_json_schema};

fn main() {
    let request = serde_json::to_string_pretty(&request_json_schema()).expect("serialize request schema");
    let report = serde_json::to_string_pretty(&report_json_schema()).expect("serialize report schema");
    println!("{request}");
    println!("{report}");
}
