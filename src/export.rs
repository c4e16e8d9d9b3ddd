//! Plain-text analysis report.

use crate::analysis::{Clause, Document, RiskLevel};
use time::Date;

const SEPARATOR_WIDTH: usize = 50;

/// Render clauses highest risk first. Clauses of equal risk keep their document order.
pub fn render_clauses(clauses: &[Clause]) -> String {
    let mut ordered: Vec<&Clause> = clauses.iter().collect();
    ordered.sort_by(|left, right| right.risk_level.cmp(&left.risk_level));
    ordered
        .into_iter()
        .map(render_clause)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_clause(clause: &Clause) -> String {
    let key_points = clause
        .key_points
        .iter()
        .map(|point| format!("• {point}"))
        .collect::<Vec<_>>()
        .join("\n");
    let risks = clause
        .risks
        .iter()
        .map(|risk| format!("⚠ {risk}"))
        .collect::<Vec<_>>()
        .join("\n");
    let details = clause
        .risk_details
        .as_deref()
        .map(|details| format!("Risk Details: {details}"))
        .unwrap_or_default();

    format!(
        "{} ({} RISK)\n{}\n\nKey Points:\n{key_points}\n\nRisks:\n{risks}\n\n{details}\n{}",
        clause.category,
        clause.risk_level.as_str().to_uppercase(),
        clause.explanation,
        "=".repeat(SEPARATOR_WIDTH)
    )
}

/// Render the downloadable report: header, risk summary, and every clause.
pub fn render_report(document: &Document, generated_on: Date) -> String {
    let low = document
        .clauses
        .iter()
        .filter(|clause| clause.risk_level == RiskLevel::Low)
        .count();
    format!(
        "LegalLens Document Analysis\nGenerated on: {generated_on}\n\nSUMMARY:\n- Total Clauses: {}\n- High/Medium Risks: {}\n- Low Risk: {low}\n\nDETAILED ANALYSIS:\n{}",
        document.clauses.len(),
        document.elevated_risk_count(),
        render_clauses(&document.clauses)
    )
}

/// File name offered for the downloaded report.
pub fn export_file_name(generated_on: Date) -> String {
    format!("legal-analysis-{generated_on}.txt")
}
