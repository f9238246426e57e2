//! Chat-completions client that phrases teacher insights.
//!
//! Only one call is made per summary, asking for a strict JSON object. The API
//! key is never logged; response bodies are logged by size only.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::{AnalyticsError, Result};
use crate::insights::TextInsightProvider;
use crate::models::{InsightMetrics, InsightSource, InsightText, OverallHealth};

const SYSTEM_PROMPT: &str = "You are an educational analytics assistant for teachers using a \
question-driven learning platform. Be concise and practical. Respond ONLY with strict JSON.";

const USER_TEMPLATE: &str = "Class metrics across {groups} groups:\n\
- Students: {students} ({active} active in the last 7 days, {rate}%)\n\
- Average question quality: {quality} / 5\n\
- Questions this week: {this_week} (last week: {last_week}, change {change}%)\n\
- Overall health: {health}\n\n\
Return JSON {\"insights\": string[], \"recommendations\": string[]} with 2-4 short \
insights and 2-3 actionable recommendations.";

#[derive(Clone)]
pub struct OpenAiInsights {
    client: reqwest::Client,
    api_key: String,
    pub base_url: String,
    pub model: String,
}

impl OpenAiInsights {
    /// Built only when OPENAI_API_KEY is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = std::env::var("OPENAI_MODEL")
            .unwrap_or_else(|_| "gpt-4o-mini".into());
        Self::new(api_key, base_url, model).ok()
    }

    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url,
            model,
        })
    }

    #[instrument(level = "info", skip(self, user), fields(model = %self.model))]
    async fn chat_json<T: for<'a> Deserialize<'a>>(&self, user: &str) -> Result<T> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessageReq {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessageReq {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
            temperature: 0.4,
            response_format: ResponseFormat {
                r#type: "json_object".into(),
            },
        };

        let res = self
            .client
            .post(&url)
            .header(USER_AGENT, concat!("smile-analytics/", env!("CARGO_PKG_VERSION")))
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let msg = extract_api_error(&body).unwrap_or(body);
            return Err(AnalyticsError::InsightProvider(format!("HTTP {status}: {msg}")));
        }

        let body: ChatCompletionResponse = res.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        info!(response_len = text.len(), "completion received");

        Ok(serde_json::from_str::<T>(&text)?)
    }
}

#[async_trait]
impl TextInsightProvider for OpenAiInsights {
    fn source(&self) -> InsightSource {
        InsightSource::Llm
    }

    async fn phrase(&self, metrics: &InsightMetrics, health: OverallHealth) -> Result<InsightText> {
        let prompt = build_prompt(metrics, health);
        let start = std::time::Instant::now();
        let result = self.chat_json::<InsightText>(&prompt).await;
        match &result {
            Ok(text) => info!(
                elapsed = ?start.elapsed(),
                insights = text.insights.len(),
                recommendations = text.recommendations.len(),
                "insights phrased by model"
            ),
            Err(e) => error!(elapsed = ?start.elapsed(), error = %e, "model call failed"),
        }
        result
    }
}

pub fn build_prompt(metrics: &InsightMetrics, health: OverallHealth) -> String {
    let health = match health {
        OverallHealth::Excellent => "excellent",
        OverallHealth::Good => "good",
        OverallHealth::NeedsAttention => "needs attention",
        OverallHealth::Critical => "critical",
    };
    let groups = metrics.total_groups.to_string();
    let students = metrics.total_students.to_string();
    let active = metrics.active_students.to_string();
    let rate = format!("{:.0}", metrics.active_rate);
    let quality = format!("{:.1}", metrics.average_quality);
    let this_week = metrics.questions_this_week.to_string();
    let last_week = metrics.questions_last_week.to_string();
    let change = format!("{:+.0}", metrics.weekly_change);
    fill_template(
        USER_TEMPLATE,
        &[
            ("groups", groups.as_str()),
            ("students", students.as_str()),
            ("active", active.as_str()),
            ("rate", rate.as_str()),
            ("quality", quality.as_str()),
            ("this_week", this_week.as_str()),
            ("last_week", last_week.as_str()),
            ("change", change.as_str()),
            ("health", health),
        ],
    )
}

/// Replaces `{key}` placeholders; unknown placeholders are left untouched.
fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = tpl.to_string();
    for (k, v) in pairs {
        out = out.replace(&format!("{{{k}}}"), v);
    }
    out
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessageReq>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessageReq {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
}

fn extract_api_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Wrap {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }
    serde_json::from_str::<Wrap>(body).ok().map(|w| w.error.message)
}
