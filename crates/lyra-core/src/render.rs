//! Plain-text rendering of a run report.
//!
//! Completed and partial units are rendered from their terminal payload.
//! When no unit produced output, the failure reports are rendered instead.

use serde_json::Value;

use crate::aggregator::{FailureReport, RunReport, UnitOutcome};
use crate::stage::Stage;

const RULE_WIDTH: usize = 60;
const MAX_LISTED_REGIONS: usize = 3;

/// Shown when the plan contained no units.
pub const NO_UNITS_MESSAGE: &str =
    "Could not identify any proteins to analyze. Please include a UniProt ID (e.g., Q8I3H7) in your question.";

/// Render a report as text.
pub fn render_report(report: &RunReport) -> String {
    if report.is_empty() {
        return NO_UNITS_MESSAGE.to_string();
    }

    let mut sections: Vec<String> = Vec::new();
    for outcome in &report.completed {
        sections.push(render_outcome(outcome, false));
    }
    for outcome in &report.partial {
        sections.push(render_outcome(outcome, true));
    }

    if sections.is_empty() {
        for failure in &report.failed_reports {
            sections.push(render_failure(failure));
        }
    }

    if sections.is_empty() {
        sections.push("No results were produced.".to_string());
    }
    sections.join("\n\n")
}

fn render_outcome(outcome: &UnitOutcome, partial: bool) -> String {
    let mut text = render_payload(outcome.unit.as_str(), outcome.stage, &outcome.result);
    if partial {
        text.push_str("\n\n_Note: produced from incomplete inputs._");
    }
    text
}

fn render_failure(failure: &FailureReport) -> String {
    let mut lines = vec![format!(
        "{} failed at {}: {}",
        failure.unit, failure.failed_at_stage, failure.error
    )];
    for extra in &failure.additional_failures {
        lines.push(format!("  also failed at {}: {}", extra.stage, extra.error));
    }
    if !failure.tasks_skipped.is_empty() {
        let skipped: Vec<&str> = failure.tasks_skipped.iter().map(Stage::as_str).collect();
        lines.push(format!("  skipped: {}", skipped.join(", ")));
    }
    if let Some(best_effort) = &failure.best_effort {
        lines.push(String::new());
        lines.push(render_payload(failure.unit.as_str(), Stage::Synthesize, best_effort));
    }
    lines.join("\n")
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("N/A")
}

/// Render one terminal payload.
pub fn render_payload(unit: &str, stage: Stage, payload: &Value) -> String {
    match stage {
        Stage::Synthesize => render_brief(unit, payload),
        Stage::AnalyzeStructure => render_structure(unit, payload),
        other => format!("{}: completed through {}", unit, other),
    }
}

fn render_brief(unit: &str, payload: &Value) -> String {
    let synthesis = payload.get("synthesis").unwrap_or(payload);
    if let Some(raw) = synthesis.get("raw_synthesis").and_then(Value::as_str) {
        return format!("# Research Brief: {}\n\n{}", unit, raw);
    }

    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        rule.clone(),
        format!("  LYRA RESEARCH BRIEF: {}", unit),
        format!("  Generated: {}", text(payload, "generated_at")),
        rule,
        String::new(),
        "## Executive Summary".to_string(),
        text(synthesis, "executive_summary").to_string(),
    ];

    if let Some(assessment) = synthesis.get("drug_target_assessment") {
        let confidence = assessment
            .get("confidence")
            .map(Value::to_string)
            .unwrap_or_else(|| "N/A".to_string());
        lines.push(String::new());
        lines.push("## Drug Target Assessment".to_string());
        lines.push(format!(
            "**{}** (Confidence: {})",
            text(assessment, "verdict"),
            confidence
        ));
        if let Some(one_liner) = assessment.get("one_liner").and_then(Value::as_str) {
            lines.push(format!("_{}_", one_liner));
        }
    }

    if let Some(findings) = synthesis.get("key_findings").and_then(Value::as_array) {
        if !findings.is_empty() {
            lines.push(String::new());
            lines.push("## Key Findings".to_string());
            for finding in findings {
                lines.push(format!(
                    "- {} ({}, source: {})",
                    text(finding, "finding"),
                    text(finding, "confidence"),
                    text(finding, "source")
                ));
            }
        }
    }

    if let Some(degraded) = payload.get("degraded_inputs").and_then(Value::as_array) {
        if !degraded.is_empty() {
            let names: Vec<&str> = degraded.iter().filter_map(Value::as_str).collect();
            lines.push(String::new());
            lines.push(format!("Missing inputs: {}", names.join(", ")));
        }
    }

    lines.join("\n")
}

fn render_structure(unit: &str, payload: &Value) -> String {
    let confidence = payload
        .get("overall_confidence")
        .and_then(Value::as_f64)
        .map(|c| format!("{:.1}/100", c))
        .unwrap_or_else(|| "N/A".to_string());

    let mut lines = vec![
        format!("## Structure Analysis: {}", unit),
        format!("Overall confidence: {}", confidence),
        String::new(),
        "### Confidence Distribution".to_string(),
        text(payload, "interpretation").to_string(),
    ];

    if let Some(regions) = payload.get("drug_target_regions").and_then(Value::as_array) {
        if !regions.is_empty() {
            lines.push(String::new());
            lines.push("### Potential Drug Target Regions".to_string());
            for region in regions.iter().take(MAX_LISTED_REGIONS) {
                lines.push(format!(
                    "- Residues {}-{} ({} aa): {}",
                    region.get("start").unwrap_or(&Value::Null),
                    region.get("end").unwrap_or(&Value::Null),
                    region.get("length").unwrap_or(&Value::Null),
                    text(region, "suitability")
                ));
            }
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{SummaryCounts, UnitOutcome};
    use crate::unit::WorkUnit;
    use serde_json::json;

    #[test]
    fn test_empty_report_message() {
        assert_eq!(render_report(&RunReport::default()), NO_UNITS_MESSAGE);
    }

    #[test]
    fn test_structure_outcome_rendered() {
        let report = RunReport {
            completed: vec![UnitOutcome {
                unit: WorkUnit::new("Q8I3H7"),
                stage: Stage::AnalyzeStructure,
                result: json!({
                    "overall_confidence": 71.46,
                    "interpretation": "40% very high confidence residues, 12% likely disordered.",
                    "drug_target_regions": [
                        {"start": 1, "end": 25, "length": 25, "suitability": "excellent"}
                    ]
                }),
            }],
            summary_counts: SummaryCounts {
                total_requested: 1,
                successful: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let rendered = render_report(&report);
        assert!(rendered.contains("Overall confidence: 71.5/100"));
        assert!(rendered.contains("- Residues 1-25 (25 aa): excellent"));
    }

    #[test]
    fn test_failures_rendered_when_nothing_succeeded() {
        let report = RunReport {
            failed_reports: vec![FailureReport {
                unit: WorkUnit::new("INVALID123"),
                failed_at_stage: Stage::Fetch,
                error: "Invalid UniProt accession 'INVALID123'".to_string(),
                error_source: None,
                error_kind: None,
                task_id: "INVALID123:fetch#0".to_string(),
                additional_failures: vec![],
                tasks_skipped: vec![Stage::AnalyzeStructure],
                best_effort: None,
            }],
            summary_counts: SummaryCounts {
                total_requested: 1,
                failed: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let rendered = render_report(&report);
        assert!(rendered.starts_with("INVALID123 failed at fetch: Invalid UniProt accession"));
        assert!(rendered.contains("skipped: analyze_structure"));
    }

    #[test]
    fn test_raw_synthesis_fallback() {
        let payload = json!({"uniprot_id": "P04637", "synthesis": {"raw_synthesis": "Free text."}});
        assert_eq!(
            render_payload("P04637", Stage::Synthesize, &payload),
            "# Research Brief: P04637\n\nFree text."
        );
    }
}
