use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use tracing::{debug, instrument};

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{EngagementLevel, EngagementPrediction, Observation, WeeklyProjection};
use crate::regression::linear_regression;
use crate::source::ObservationSource;

pub const WINDOW_DAYS: i64 = 28;
const PROJECTED_WEEKS: usize = 4;
const POSTING_TIMES: usize = 3;

#[instrument(
    level = "debug",
    skip(observations, clock),
    fields(observations = observations.len())
)]
pub fn predict_engagement(
    activity_id: &str,
    observations: &[Observation],
    clock: &dyn Clock,
) -> EngagementPrediction {
    let now = clock.now();
    let cutoff = now - Duration::days(WINDOW_DAYS);
    let recent: Vec<&Observation> = observations
        .iter()
        .filter(|obs| obs.created_at >= cutoff && obs.created_at <= now)
        .collect();

    let mut by_hour = [0usize; 24];
    let mut by_week: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for obs in &recent {
        by_hour[obs.created_at.hour() as usize] += 1;
        *by_week
            .entry(week_start(obs.created_at.date_naive()))
            .or_insert(0) += 1;
    }

    let peak_hours = top_hours(&by_hour);
    let weekly: Vec<f64> = by_week.values().map(|count| *count as f64).collect();
    let fit = linear_regression(&weekly);

    let current_week = week_start(now.date_naive());
    let predicted_weekly_questions = (0..PROJECTED_WEEKS)
        .map(|i| WeeklyProjection {
            week_start: current_week + Duration::weeks(i as i64 + 1),
            expected_questions: fit.at((weekly.len() + i) as f64).round().max(0.0) as i64,
        })
        .collect();

    let average_weekly_questions = if weekly.is_empty() {
        0.0
    } else {
        weekly.iter().sum::<f64>() / weekly.len() as f64
    };
    let engagement_level = classify_engagement(average_weekly_questions);

    debug!(
        weeks = weekly.len(),
        slope = fit.slope,
        average_weekly_questions,
        "engagement projected"
    );

    EngagementPrediction {
        activity_id: activity_id.to_string(),
        predicted_weekly_questions,
        engagement_level,
        average_weekly_questions,
        optimal_posting_times: peak_hours.iter().map(|h| format_hour(*h)).collect(),
        factors_affecting: factors(fit.slope, peak_hours.first().copied(), recent.len()),
    }
}

/// Fetches the activity's recent questions and projects them; `None` for an unknown activity.
pub async fn engagement_for_activity(
    source: &dyn ObservationSource,
    activity_id: &str,
    clock: &dyn Clock,
) -> Result<Option<EngagementPrediction>> {
    let since = clock.now() - Duration::days(WINDOW_DAYS);
    let observations = source.activity_observations(activity_id, since).await?;
    Ok(observations.map(|obs| predict_engagement(activity_id, &obs, clock)))
}

pub fn classify_engagement(average_weekly_questions: f64) -> EngagementLevel {
    if average_weekly_questions > 20.0 {
        EngagementLevel::High
    } else if average_weekly_questions > 5.0 {
        EngagementLevel::Medium
    } else {
        EngagementLevel::Low
    }
}

/// Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// "2:00 PM" style label for an hour of the day.
pub fn format_hour(hour: u32) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display}:00 {suffix}")
}

fn top_hours(by_hour: &[usize; 24]) -> Vec<u32> {
    let mut hours: Vec<(u32, usize)> = by_hour
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(hour, count)| (hour as u32, *count))
        .collect();
    hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    hours
        .into_iter()
        .take(POSTING_TIMES)
        .map(|(hour, _)| hour)
        .collect()
}

fn factors(slope: f64, peak_hour: Option<u32>, recent: usize) -> Vec<String> {
    if recent == 0 {
        return vec!["No questions posted in the last 4 weeks".to_string()];
    }

    let mut notes = Vec::new();
    if slope > 0.0 {
        notes.push("Question activity is trending upward week over week".to_string());
    } else if slope < 0.0 {
        notes.push("Question activity is declining week over week".to_string());
    } else {
        notes.push("Question activity is holding steady".to_string());
    }

    if let Some(hour) = peak_hour {
        notes.push(format!("Students are most active around {}", format_hour(hour)));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::source::CsvSource;
    use chrono::{DateTime, TimeZone, Utc};

    // A Wednesday.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 18, 12, 0, 0).unwrap()
    }

    fn at(days_ago: i64, hour: u32) -> Observation {
        let day = (now() - Duration::days(days_ago)).date_naive();
        Observation {
            student_id: "s1".to_string(),
            activity_id: Some("a1".to_string()),
            group_id: None,
            created_at: day.and_hms_opt(hour, 15, 0).unwrap().and_utc(),
            quality: None,
        }
    }

    #[test]
    fn weekly_average_thresholds() {
        assert_eq!(classify_engagement(20.0), EngagementLevel::Medium);
        assert_eq!(classify_engagement(21.0), EngagementLevel::High);
        assert_eq!(classify_engagement(5.0), EngagementLevel::Low);
        assert_eq!(classify_engagement(6.0), EngagementLevel::Medium);
    }

    #[test]
    fn hour_labels() {
        assert_eq!(format_hour(0), "12:00 AM");
        assert_eq!(format_hour(9), "9:00 AM");
        assert_eq!(format_hour(12), "12:00 PM");
        assert_eq!(format_hour(14), "2:00 PM");
        assert_eq!(format_hour(23), "11:00 PM");
    }

    #[test]
    fn weeks_start_on_sunday() {
        let wednesday = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(week_start(wednesday), sunday);
        assert_eq!(week_start(sunday), sunday);
    }

    #[test]
    fn picks_busiest_hours() {
        let mut data = Vec::new();
        data.extend((0..3).map(|_| at(1, 14)));
        data.extend((0..2).map(|_| at(1, 9)));
        data.push(at(1, 20));
        data.push(at(2, 7));

        let prediction = predict_engagement("a1", &data, &FixedClock(now()));
        assert_eq!(
            prediction.optimal_posting_times,
            vec!["2:00 PM", "9:00 AM", "7:00 AM"]
        );
        assert!(prediction
            .factors_affecting
            .iter()
            .any(|f| f.contains("2:00 PM")));
    }

    #[test]
    fn projects_four_weeks_from_growing_activity() {
        // Weeks starting 2/22, 3/1, 3/8, 3/15 with 1, 2, 3, 4 questions.
        let mut data = Vec::new();
        data.push(at(24, 10));
        data.extend((0..2).map(|_| at(17, 10)));
        data.extend((0..3).map(|_| at(10, 10)));
        data.extend((0..4).map(|_| at(2, 10)));

        let prediction = predict_engagement("a1", &data, &FixedClock(now()));
        let expected: Vec<i64> = prediction
            .predicted_weekly_questions
            .iter()
            .map(|w| w.expected_questions)
            .collect();
        assert_eq!(expected, vec![5, 6, 7, 8]);
        assert_eq!(
            prediction.predicted_weekly_questions[0].week_start,
            NaiveDate::from_ymd_opt(2026, 3, 22).unwrap()
        );
        assert_eq!(prediction.engagement_level, EngagementLevel::Low);
        assert!(prediction.factors_affecting[0].contains("upward"));
    }

    #[test]
    fn declining_projection_never_goes_negative() {
        let mut data = Vec::new();
        data.extend((0..9).map(|_| at(17, 10)));
        data.extend((0..1).map(|_| at(10, 10)));

        let prediction = predict_engagement("a1", &data, &FixedClock(now()));
        assert!(prediction
            .predicted_weekly_questions
            .iter()
            .all(|w| w.expected_questions == 0));
    }

    #[tokio::test]
    async fn unknown_activity_has_no_prediction() {
        let export = "student_id,activity_id,created_at\ns1,a1,2026-03-17T10:00:00Z\n";
        let source = CsvSource::from_reader(export.as_bytes()).unwrap();
        let clock = FixedClock(now());

        let missing = engagement_for_activity(&source, "a2", &clock).await.unwrap();
        assert!(missing.is_none());

        let found = engagement_for_activity(&source, "a1", &clock)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.optimal_posting_times, vec!["10:00 AM"]);
    }

    #[test]
    fn questions_dated_after_now_are_ignored() {
        let data = vec![at(1, 10), at(-1, 20), at(-3, 20)];
        let prediction = predict_engagement("a1", &data, &FixedClock(now()));
        assert_eq!(prediction.optimal_posting_times, vec!["10:00 AM"]);
        assert_eq!(prediction.average_weekly_questions, 1.0);
    }

    #[test]
    fn empty_window_is_low_engagement() {
        let data = vec![at(40, 10)];
        let prediction = predict_engagement("a1", &data, &FixedClock(now()));
        assert_eq!(prediction.engagement_level, EngagementLevel::Low);
        assert!(prediction.optimal_posting_times.is_empty());
        assert_eq!(prediction.average_weekly_questions, 0.0);
        assert_eq!(prediction.factors_affecting.len(), 1);
    }

    #[test]
    fn high_engagement_above_twenty_per_week() {
        let data: Vec<Observation> = (0..21).map(|i| at(1, (i % 24) as u32)).collect();
        let prediction = predict_engagement("a1", &data, &FixedClock(now()));
        assert_eq!(prediction.average_weekly_questions, 21.0);
        assert_eq!(prediction.engagement_level, EngagementLevel::High);
    }
}
