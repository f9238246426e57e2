use std::fmt::Write;

use crate::models::{AtRiskStudent, InsightsSummary, OverallHealth, RiskLevel};

fn health_label(health: OverallHealth) -> &'static str {
    match health {
        OverallHealth::Excellent => "Excellent",
        OverallHealth::Good => "Good",
        OverallHealth::NeedsAttention => "Needs attention",
        OverallHealth::Critical => "Critical",
    }
}

fn risk_label(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "high",
        RiskLevel::Medium => "medium",
        RiskLevel::Low => "low",
    }
}

/// Markdown digest of a teacher's classes.
pub fn build_report(
    owner_id: &str,
    summary: Option<&InsightsSummary>,
    at_risk: &[AtRiskStudent],
    limit: usize,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Class Insights Report");
    let _ = writeln!(output, "Generated for teacher {owner_id}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    match summary {
        None => {
            let _ = writeln!(output, "No groups owned by this teacher.");
        }
        Some(summary) => {
            let m = &summary.metrics;
            let _ = writeln!(
                output,
                "- Health: {}",
                health_label(summary.overall_health)
            );
            let _ = writeln!(
                output,
                "- Active students: {} of {} ({:.0}%) across {} groups",
                m.active_students, m.total_students, m.active_rate, m.total_groups
            );
            let _ = writeln!(output, "- Average question quality: {:.1}", m.average_quality);
            let _ = writeln!(
                output,
                "- Questions this week: {} (last week {}, {:+.0}%)",
                m.questions_this_week, m.questions_last_week, m.weekly_change
            );

            let _ = writeln!(output);
            let _ = writeln!(output, "## Key Insights");
            for insight in &summary.key_insights {
                let _ = writeln!(output, "- {insight}");
            }

            let _ = writeln!(output);
            let _ = writeln!(output, "## Recommendations");
            for rec in &summary.recommendations {
                let _ = writeln!(output, "- {rec}");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students At Risk");

    if at_risk.is_empty() {
        let _ = writeln!(output, "No students above the risk threshold.");
    } else {
        for student in at_risk.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} ({} risk, score {}): {}. {}",
                student.name.as_deref().unwrap_or(&student.student_id),
                risk_label(student.risk_level),
                student.risk_score,
                student.risk_factors.join("; "),
                student.suggested_intervention
            );
        }
    }

    output
}
