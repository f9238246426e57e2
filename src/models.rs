use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One question submission, optionally evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub student_id: String,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Evaluation score on the 1..=5 scale.
    #[serde(default)]
    pub quality: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentActivity {
    pub student_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

/// Everything a teacher owns: groups, their members and the questions posted in them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    pub owner_id: String,
    pub group_ids: Vec<String>,
    pub member_ids: Vec<String>,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub name: String,
    pub min_points: i64,
    #[serde(default)]
    pub max_points: Option<i64>,
    pub color: String,
    pub icon: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub current_tier: Tier,
    pub next_tier: Option<Tier>,
    pub progress_percentage: f64,
    pub points_to_next: i64,
    pub is_max_tier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuality {
    pub date: NaiveDate,
    pub average_quality: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformancePrediction {
    pub student_id: String,
    pub current_trend: Trend,
    pub slope: f64,
    pub predicted_quality: f64,
    pub confidence: f64,
    pub historical_data: Vec<DailyQuality>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskStudent {
    pub student_id: String,
    pub name: Option<String>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub question_count: usize,
    pub average_quality: f64,
    pub days_since_activity: i64,
    pub suggested_intervention: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyProjection {
    pub week_start: NaiveDate,
    pub expected_questions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementPrediction {
    pub activity_id: String,
    pub predicted_weekly_questions: Vec<WeeklyProjection>,
    pub engagement_level: EngagementLevel,
    pub average_weekly_questions: f64,
    pub optimal_posting_times: Vec<String>,
    pub factors_affecting: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSlot {
    /// 0 = Sunday.
    pub day_of_week: u32,
    pub day_name: String,
    pub hour: u32,
    pub count: usize,
    pub engagement_sum: f64,
    pub engagement_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Excellent,
    Good,
    NeedsAttention,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightMetrics {
    pub total_groups: usize,
    pub total_students: usize,
    pub active_students: usize,
    /// Percent of members active in the trailing 7 days.
    pub active_rate: f64,
    pub average_quality: f64,
    pub questions_this_week: usize,
    pub questions_last_week: usize,
    /// Week-over-week change in question count, percent.
    pub weekly_change: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightText {
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSource {
    Llm,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsSummary {
    pub owner_id: String,
    #[serde(flatten)]
    pub metrics: InsightMetrics,
    pub overall_health: OverallHealth,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub generated_by: InsightSource,
}
