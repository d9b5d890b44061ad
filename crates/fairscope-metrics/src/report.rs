use fairscope_core::{
    AttributeReport, BiasReport, MetricResult, MetricSet, Severity, SeverityThresholds,
};

/// One interpreted comparison, used by the markdown report and strict mode.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub section: &'static str,
    pub attribute: String,
    pub comparison: String,
    pub spd: Option<f64>,
    pub di: Option<f64>,
    pub spd_severity: Severity,
    pub di_severity: Severity,
}

impl SummaryRow {
    pub fn severity(&self) -> Severity {
        self.spd_severity.max(self.di_severity)
    }
}

/// Headline comparisons of every section, attribute order preserved.
pub fn summary_rows(report: &BiasReport, thresholds: &SeverityThresholds) -> Vec<SummaryRow> {
    let mut rows = Vec::new();
    push_section(&mut rows, "original", &report.original, thresholds);
    if let Some(reweighed) = &report.reweighed {
        push_section(&mut rows, "reweighed", reweighed, thresholds);
    }
    rows
}

/// Worst severity among the original headline metrics.
pub fn worst_severity(report: &BiasReport, thresholds: &SeverityThresholds) -> Severity {
    summary_rows(report, thresholds)
        .iter()
        .filter(|row| row.section == "original")
        .map(SummaryRow::severity)
        .max()
        .unwrap_or(Severity::Unavailable)
}

fn push_section(
    rows: &mut Vec<SummaryRow>,
    section: &'static str,
    set: &MetricSet,
    thresholds: &SeverityThresholds,
) {
    for (attribute, entry) in &set.attributes {
        let Some(result) = entry.headline() else {
            continue;
        };
        rows.push(SummaryRow {
            section,
            attribute: attribute.clone(),
            comparison: comparison(result),
            spd: result.statistical_parity_difference,
            di: result.disparate_impact,
            spd_severity: thresholds.classify_spd(result.statistical_parity_difference),
            di_severity: thresholds.classify_di(result.disparate_impact),
        });
    }
}

fn comparison(result: &MetricResult) -> String {
    format!("{} vs {}", result.unprivileged.group, result.privileged.group)
}

fn number(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.4}"))
        .unwrap_or_else(|| "-".to_string())
}

/// Render a deterministic markdown report.
pub fn render_report(report: &BiasReport, thresholds: &SeverityThresholds) -> String {
    let mut lines = Vec::new();

    lines.push("# Fairscope Bias Report".to_string());
    lines.push(String::new());
    lines.push(format!("- dataset_type: {}", report.dataset_type.as_str()));
    lines.push(format!(
        "- attributes: {}",
        report.original.attributes.len()
    ));
    lines.push(String::new());

    let rows = summary_rows(report, thresholds);
    lines.push("## Summary".to_string());
    lines.push("| section | attribute | comparison | SPD | DI | severity |".to_string());
    lines.push("| --- | --- | --- | --- | --- | --- |".to_string());
    for row in &rows {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            row.section,
            row.attribute,
            row.comparison,
            number(row.spd),
            number(row.di),
            row.severity().as_str()
        ));
    }
    lines.push(String::new());

    let failures: Vec<(&String, &AttributeReport)> = report
        .original
        .attributes
        .iter()
        .filter(|(_, entry)| matches!(entry, AttributeReport::Failed(_)))
        .collect();
    if !failures.is_empty() {
        lines.push("## Skipped attributes".to_string());
        for (attribute, entry) in failures {
            if let AttributeReport::Failed(failure) = entry {
                lines.push(format!(
                    "- {attribute}: [{}] {}",
                    failure.error.kind, failure.error.message
                ));
            }
        }
        lines.push(String::new());
    }

    for (attribute, entry) in &report.original.attributes {
        let AttributeReport::Aggregate(aggregate) = entry else {
            continue;
        };
        lines.push(format!("## {attribute} pairwise ({})", aggregate.kind.as_str()));
        lines.push(format!("- reference: {}", aggregate.reference));
        lines.push("| unprivileged | privileged | SPD | DI |".to_string());
        lines.push("| --- | --- | --- | --- |".to_string());
        for (unprivileged, inner) in &aggregate.group_metrics {
            for (privileged, result) in inner {
                lines.push(format!(
                    "| {unprivileged} | {privileged} | {} | {} |",
                    number(result.statistical_parity_difference),
                    number(result.disparate_impact)
                ));
            }
        }
        lines.push(String::new());
    }

    if !report.original.outcome_rates.is_empty() {
        lines.push("## Outcome rates".to_string());
        lines.push("| attribute | privileged | unprivileged |".to_string());
        lines.push("| --- | --- | --- |".to_string());
        for (attribute, rates) in report.original.outcome_rates.iter() {
            lines.push(format!(
                "| {attribute} | {} | {} |",
                number(rates.privileged),
                number(rates.unprivileged)
            ));
        }
        lines.push(String::new());
    }

    if !report.original.raw_data.is_empty() {
        lines.push("## Raw counts".to_string());
        lines.push("| attribute | group | approved | total |".to_string());
        lines.push("| --- | --- | --- | --- |".to_string());
        for (attribute, groups) in report.original.raw_data.iter() {
            for (group, counts) in groups {
                lines.push(format!(
                    "| {attribute} | {group} | {} | {} |",
                    counts.approved, counts.total
                ));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AuditEngine;
    use fairscope_core::{AuditOptions, DatasetType, load_csv};

    fn sample_report() -> BiasReport {
        let dataset = load_csv(
            "Gender,Religion,y\nMale,A,1\nMale,B,1\nFemale,A,0\nFemale,B,1\n",
        )
        .expect("dataset");
        let options = AuditOptions::new("y", &["Gender", "Religion"], DatasetType::Training);
        AuditEngine::default()
            .run(&dataset, &options)
            .expect("audit")
            .report
    }

    #[test]
    fn renders_summary_and_skipped_attributes() {
        let report = sample_report();
        let markdown = render_report(&report, &SeverityThresholds::default());
        assert!(markdown.starts_with("# Fairscope Bias Report"));
        assert!(markdown.contains("| original | Gender | Female vs Male | -0.5000 | 0.5000 | high |"));
        assert!(markdown.contains("## Skipped attributes"));
        assert!(markdown.contains("- Religion: [group_resolution]"));
        assert!(markdown.contains("| Gender | Female | 1 | 2 |"));
        assert!(markdown.contains("| Gender | 1.0000 | 0.5000 |"));
    }

    #[test]
    fn worst_severity_reads_original_section() {
        let report = sample_report();
        assert_eq!(
            worst_severity(&report, &SeverityThresholds::default()),
            Severity::High
        );
        let rows = summary_rows(&report, &SeverityThresholds::default());
        assert!(rows.iter().any(|row| row.section == "reweighed"));
    }
}
