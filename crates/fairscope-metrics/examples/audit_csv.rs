use std::env;

use fairscope_core::{AuditOptions, DatasetType, SeverityThresholds, load_csv};
use fairscope_metrics::{AuditEngine, render_report};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let path = args.next().ok_or("usage: audit_csv <file.csv> <outcome> <attr>...")?;
    let outcome = args.next().ok_or("missing outcome column")?;
    let attributes: Vec<String> = args.collect();
    let attributes: Vec<&str> = attributes.iter().map(String::as_str).collect();

    let dataset = load_csv(&std::fs::read_to_string(path)?)?;
    let options = AuditOptions::new(outcome, &attributes, DatasetType::Training);
    let outcome = AuditEngine::default().run(&dataset, &options)?;

    println!("{}", render_report(&outcome.report, &SeverityThresholds::default()));
    Ok(())
}
