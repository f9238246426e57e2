use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use tracing::{debug, instrument};

use crate::clock::Clock;
use crate::models::{DailyQuality, Observation, PerformancePrediction, Trend};
use crate::regression::linear_regression;

pub const WINDOW_DAYS: i64 = 30;
pub const MIN_OBSERVATIONS: usize = 3;
const TREND_THRESHOLD: f64 = 0.1;

#[instrument(
    level = "debug",
    skip(observations, clock),
    fields(observations = observations.len())
)]
pub fn predict_performance(
    student_id: &str,
    observations: &[Observation],
    clock: &dyn Clock,
) -> Option<PerformancePrediction> {
    let now = clock.now();
    let cutoff = now - Duration::days(WINDOW_DAYS);
    let scored: Vec<(NaiveDate, f64)> = observations
        .iter()
        .filter(|obs| obs.created_at >= cutoff && obs.created_at <= now)
        .filter_map(|obs| obs.quality.map(|q| (obs.created_at.date_naive(), q)))
        .collect();

    if scored.len() < MIN_OBSERVATIONS {
        debug!(scored = scored.len(), "not enough scored questions for a prediction");
        return None;
    }

    let historical_data = daily_averages(&scored);
    let series: Vec<f64> = historical_data.iter().map(|d| d.average_quality).collect();
    let fit = linear_regression(&series);
    let current_trend = classify_trend(fit.slope);

    let predicted_quality = fit.at(series.len() as f64).clamp(1.0, 5.0);
    let variance = series
        .iter()
        .map(|avg| (avg - predicted_quality).powi(2))
        .sum::<f64>()
        / series.len() as f64;
    let confidence = (1.0 - variance / 5.0).clamp(0.3, 0.95);

    Some(PerformancePrediction {
        student_id: student_id.to_string(),
        current_trend,
        slope: fit.slope,
        predicted_quality: round1(predicted_quality),
        confidence,
        historical_data,
        recommendation: recommendation(current_trend).to_string(),
    })
}

pub fn classify_trend(slope: f64) -> Trend {
    if slope > TREND_THRESHOLD {
        Trend::Improving
    } else if slope < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

fn daily_averages(scored: &[(NaiveDate, f64)]) -> Vec<DailyQuality> {
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, quality) in scored {
        let entry = days.entry(*date).or_insert((0.0, 0));
        entry.0 += quality;
        entry.1 += 1;
    }

    days.into_iter()
        .map(|(date, (total, count))| DailyQuality {
            date,
            average_quality: round1(total / count as f64),
            count,
        })
        .collect()
}

fn recommendation(trend: Trend) -> &'static str {
    match trend {
        Trend::Improving => {
            "Great progress! Keep challenging this student with higher-order questions."
        }
        Trend::Declining => {
            "Question quality is slipping. \
             Review recent feedback together and model strong examples."
        }
        Trend::Stable => {
            "Performance is steady. Encourage more complex questions to spark further growth."
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
