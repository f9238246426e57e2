//! Teacher-level summary across all owned groups.
//!
//! Metrics and health are computed locally. Natural-language phrasing comes
//! from a [`TextInsightProvider`]; whatever the provider does, the summary
//! falls back to [`TemplateInsights`] so a caller always gets a full result.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{
    GroupSnapshot, InsightMetrics, InsightSource, InsightText, InsightsSummary, Observation,
    OverallHealth,
};

pub const ACTIVE_WINDOW_DAYS: i64 = 7;
pub const QUALITY_WINDOW_DAYS: i64 = 30;

#[async_trait]
pub trait TextInsightProvider: Send + Sync {
    fn source(&self) -> InsightSource;

    async fn phrase(&self, metrics: &InsightMetrics, health: OverallHealth) -> Result<InsightText>;
}

#[instrument(level = "info", skip_all, fields(owner = %snapshot.owner_id))]
pub async fn insights_summary(
    snapshot: &GroupSnapshot,
    clock: &dyn Clock,
    provider: &dyn TextInsightProvider,
) -> Option<InsightsSummary> {
    if snapshot.group_ids.is_empty() {
        info!("teacher owns no groups; nothing to summarize");
        return None;
    }

    let metrics = compute_metrics(snapshot, clock);
    let overall_health = classify_health(metrics.active_rate, metrics.average_quality);

    let (text, generated_by) = match provider.phrase(&metrics, overall_health).await {
        Ok(text) if !text.insights.is_empty() => (text, provider.source()),
        Ok(_) => {
            warn!("insight provider returned no insights; using template text");
            (TemplateInsights.render(&metrics, overall_health), InsightSource::Template)
        }
        Err(e) => {
            warn!(error = %e, "insight provider failed; using template text");
            (TemplateInsights.render(&metrics, overall_health), InsightSource::Template)
        }
    };

    Some(InsightsSummary {
        owner_id: snapshot.owner_id.clone(),
        metrics,
        overall_health,
        key_insights: text.insights,
        recommendations: text.recommendations,
        generated_by,
    })
}

pub fn compute_metrics(snapshot: &GroupSnapshot, clock: &dyn Clock) -> InsightMetrics {
    let now = clock.now();
    let this_week_start = now - Duration::days(ACTIVE_WINDOW_DAYS);
    let last_week_start = now - Duration::days(ACTIVE_WINDOW_DAYS * 2);
    let quality_start = now - Duration::days(QUALITY_WINDOW_DAYS);
    let observations: Vec<&Observation> = snapshot
        .observations
        .iter()
        .filter(|obs| obs.created_at <= now)
        .collect();

    let members: HashSet<&str> = snapshot.member_ids.iter().map(String::as_str).collect();
    let active: HashSet<&str> = observations
        .iter()
        .copied()
        .filter(|obs| obs.created_at >= this_week_start)
        .map(|obs| obs.student_id.as_str())
        .filter(|id| members.contains(id))
        .collect();

    let questions_this_week = observations
        .iter()
        .filter(|obs| obs.created_at >= this_week_start)
        .count();
    let questions_last_week = observations
        .iter()
        .filter(|obs| obs.created_at >= last_week_start && obs.created_at < this_week_start)
        .count();

    let scores: Vec<f64> = observations
        .iter()
        .filter(|obs| obs.created_at >= quality_start)
        .filter_map(|obs| obs.quality)
        .collect();
    let average_quality = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    let active_rate = if members.is_empty() {
        0.0
    } else {
        active.len() as f64 / members.len() as f64 * 100.0
    };

    let weekly_change = if questions_last_week == 0 {
        if questions_this_week > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        (questions_this_week as f64 - questions_last_week as f64) / questions_last_week as f64
            * 100.0
    };

    InsightMetrics {
        total_groups: snapshot.group_ids.len(),
        total_students: members.len(),
        active_students: active.len(),
        active_rate,
        average_quality,
        questions_this_week,
        questions_last_week,
        weekly_change,
    }
}

pub fn classify_health(active_rate: f64, average_quality: f64) -> OverallHealth {
    if active_rate >= 70.0 && average_quality >= 3.5 {
        OverallHealth::Excellent
    } else if active_rate >= 50.0 && average_quality >= 3.0 {
        OverallHealth::Good
    } else if active_rate >= 30.0 || average_quality >= 2.5 {
        OverallHealth::NeedsAttention
    } else {
        OverallHealth::Critical
    }
}

/// Fixed sentences built from the computed metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateInsights;

impl TemplateInsights {
    pub fn render(&self, metrics: &InsightMetrics, health: OverallHealth) -> InsightText {
        let direction = if metrics.weekly_change > 0.0 {
            "rose"
        } else if metrics.weekly_change < 0.0 {
            "fell"
        } else {
            "held steady"
        };

        let mut insights = vec![
            format!(
                "{} of {} students ({:.0}%) posted questions in the past 7 days.",
                metrics.active_students, metrics.total_students, metrics.active_rate
            ),
            format!(
                "Average question quality is {:.1} out of 5.",
                metrics.average_quality
            ),
            format!(
                "Question volume {} {:.0}% week over week ({} vs {}).",
                direction,
                metrics.weekly_change.abs(),
                metrics.questions_this_week,
                metrics.questions_last_week
            ),
        ];
        if health == OverallHealth::Critical {
            insights.push(
                "Overall class health is critical and needs prompt follow-up.".to_string(),
            );
        }

        let mut recommendations = Vec::new();
        if metrics.active_rate < 50.0 {
            recommendations.push(
                "Reach out to inactive students with a short, low-stakes activity.".to_string(),
            );
        }
        if metrics.average_quality < 3.0 {
            recommendations.push(
                "Share exemplar questions and the evaluation rubric to lift question quality."
                    .to_string(),
            );
        }
        if metrics.weekly_change < 0.0 {
            recommendations.push("Launch a new activity to restore question momentum.".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push(
                "Keep the current cadence and introduce more challenging activities.".to_string(),
            );
        }

        InsightText {
            insights,
            recommendations,
        }
    }
}

#[async_trait]
impl TextInsightProvider for TemplateInsights {
    fn source(&self) -> InsightSource {
        InsightSource::Template
    }

    async fn phrase(&self, metrics: &InsightMetrics, health: OverallHealth) -> Result<InsightText> {
        Ok(self.render(metrics, health))
    }
}
