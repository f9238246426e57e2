use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::clock::Clock;
use crate::models::{AtRiskStudent, RiskLevel, StudentActivity};

pub const INCLUSION_THRESHOLD: u32 = 40;
/// Days reported for a student who has never posted a question.
pub const NEVER_ACTIVE_DAYS: i64 = 999;

#[instrument(level = "debug", skip(students, clock), fields(students = students.len()))]
pub fn score_at_risk(
    students: &[StudentActivity],
    group: Option<&str>,
    clock: &dyn Clock,
) -> Vec<AtRiskStudent> {
    let now = clock.now();
    let mut flagged: Vec<AtRiskStudent> = students
        .iter()
        .filter(|student| match group {
            Some(group) => student.group_ids.iter().any(|g| g == group),
            None => true,
        })
        .map(|student| score_student(student, now))
        .filter(|scored| scored.risk_score >= INCLUSION_THRESHOLD)
        .collect();

    flagged.sort_by(|a, b| {
        b.risk_score
            .cmp(&a.risk_score)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    debug!(flagged = flagged.len(), "at-risk scoring complete");
    flagged
}

/// Scores only members of `owned_groups`. A `group` outside them yields nothing.
pub fn score_owned_at_risk(
    students: &[StudentActivity],
    owned_groups: &[String],
    group: Option<&str>,
    clock: &dyn Clock,
) -> Vec<AtRiskStudent> {
    if let Some(group) = group {
        if !owned_groups.iter().any(|g| g == group) {
            return Vec::new();
        }
    }
    let roster: Vec<StudentActivity> = students
        .iter()
        .filter(|student| student.group_ids.iter().any(|g| owned_groups.contains(g)))
        .cloned()
        .collect();
    score_at_risk(&roster, group, clock)
}

pub fn score_student(student: &StudentActivity, now: DateTime<Utc>) -> AtRiskStudent {
    let question_count = student.observations.len();
    let scores: Vec<f64> = student
        .observations
        .iter()
        .filter_map(|obs| obs.quality)
        .collect();
    let average_quality = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let days_since_activity = student
        .observations
        .iter()
        .map(|obs| obs.created_at)
        .max()
        .map(|last| (now - last).num_days())
        .unwrap_or(NEVER_ACTIVE_DAYS);

    let mut risk_score = 0;
    let mut risk_factors = Vec::new();

    if question_count < 3 {
        risk_score += 30;
        risk_factors.push("Very few questions created".to_string());
    } else if question_count < 10 {
        risk_score += 15;
        risk_factors.push("Limited question activity".to_string());
    }

    if average_quality < 2.5 {
        risk_score += 25;
        risk_factors.push("Low question quality average".to_string());
    } else if average_quality < 3.0 {
        risk_score += 15;
        risk_factors.push("Below average question quality".to_string());
    }

    if days_since_activity >= 14 {
        risk_score += 45;
        risk_factors.push(format!("Inactive for {days_since_activity} days"));
    } else if days_since_activity >= 7 {
        risk_score += 20;
        risk_factors.push(format!("No activity in {days_since_activity} days"));
    }

    let risk_level = risk_level(risk_score);

    AtRiskStudent {
        student_id: student.student_id.clone(),
        name: student.name.clone(),
        risk_score,
        risk_level,
        risk_factors,
        question_count,
        average_quality,
        days_since_activity,
        suggested_intervention: intervention(risk_level).to_string(),
    }
}

pub fn risk_level(score: u32) -> RiskLevel {
    match score {
        70.. => RiskLevel::High,
        50..=69 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

fn intervention(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => {
            "Schedule a one-on-one check-in and pair the student with a peer mentor."
        }
        RiskLevel::Medium => {
            "Send a personal encouragement message and suggest a guided question activity."
        }
        RiskLevel::Low => "Monitor progress and highlight upcoming activities.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::Observation;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap()
    }

    fn student(id: &str, questions: &[(i64, Option<f64>)]) -> StudentActivity {
        StudentActivity {
            student_id: id.to_string(),
            name: Some(format!("Student {id}")),
            group_ids: vec!["g1".to_string()],
            observations: questions
                .iter()
                .map(|(days_ago, quality)| Observation {
                    student_id: id.to_string(),
                    activity_id: None,
                    group_id: Some("g1".to_string()),
                    created_at: now() - Duration::days(*days_ago),
                    quality: *quality,
                })
                .collect(),
        }
    }

    #[test]
    fn three_questions_still_count_as_limited_activity() {
        let s = student("s1", &[(7, Some(2.5)), (8, Some(2.5)), (9, Some(2.5))]);
        let scored = score_student(&s, now());
        assert_eq!(scored.risk_score, 15 + 15 + 20);
        assert_eq!(scored.risk_level, RiskLevel::Medium);
        assert_eq!(
            scored.risk_factors,
            vec![
                "Limited question activity",
                "Below average question quality",
                "No activity in 7 days"
            ]
        );

        let flagged = score_at_risk(&[s], None, &FixedClock(now()));
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].risk_score, 50);
    }

    #[test]
    fn score_of_35_is_excluded() {
        // 10 questions: 15 for quality + 20 for a week of silence.
        let s = student("s1", &[(7, Some(2.5)); 10]);
        let scored = score_student(&s, now());
        assert_eq!(scored.risk_score, 35);
        assert!(score_at_risk(&[s], None, &FixedClock(now())).is_empty());
    }

    #[test]
    fn inactive_low_quality_student_is_high_risk() {
        let s = student("s1", &[(20, Some(2.0))]);
        let flagged = score_at_risk(&[s], None, &FixedClock(now()));
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].risk_score, 100);
        assert_eq!(flagged[0].risk_level, RiskLevel::High);
        assert_eq!(
            flagged[0].risk_factors,
            vec![
                "Very few questions created",
                "Low question quality average",
                "Inactive for 20 days"
            ]
        );
    }

    #[test]
    fn volume_boundaries() {
        let nine: Vec<(i64, Option<f64>)> = (0..9).map(|_| (1, Some(4.0))).collect();
        let ten: Vec<(i64, Option<f64>)> = (0..10).map(|_| (1, Some(4.0))).collect();
        let two = [(1, Some(4.0)), (1, Some(4.0))];
        assert_eq!(score_student(&student("a", &nine), now()).risk_score, 15);
        assert_eq!(score_student(&student("b", &ten), now()).risk_score, 0);
        assert_eq!(score_student(&student("c", &two), now()).risk_score, 30);
    }

    #[test]
    fn quality_boundaries() {
        let many = |q: f64| -> Vec<(i64, Option<f64>)> {
            (0..10).map(|_| (1, Some(q))).collect()
        };
        assert_eq!(score_student(&student("a", &many(2.49)), now()).risk_score, 25);
        assert_eq!(score_student(&student("b", &many(2.5)), now()).risk_score, 15);
        assert_eq!(score_student(&student("c", &many(2.99)), now()).risk_score, 15);
        assert_eq!(score_student(&student("d", &many(3.0)), now()).risk_score, 0);
    }

    #[test]
    fn inactivity_boundaries() {
        let at = |days: i64| -> Vec<(i64, Option<f64>)> {
            (0..10).map(|_| (days, Some(4.0))).collect()
        };
        assert_eq!(score_student(&student("a", &at(6)), now()).risk_score, 0);
        assert_eq!(score_student(&student("b", &at(7)), now()).risk_score, 20);
        assert_eq!(score_student(&student("c", &at(13)), now()).risk_score, 20);
        assert_eq!(score_student(&student("d", &at(14)), now()).risk_score, 45);
    }

    #[test]
    fn unscored_and_silent_students() {
        let unscored = student("s1", &[(1, None), (1, None), (1, None)]);
        let scored = score_student(&unscored, now());
        assert_eq!(scored.average_quality, 0.0);
        assert_eq!(scored.risk_score, 15 + 25);

        let silent = student("s2", &[]);
        let scored = score_student(&silent, now());
        assert_eq!(scored.days_since_activity, NEVER_ACTIVE_DAYS);
        assert_eq!(scored.risk_score, 30 + 25 + 45);
        assert_eq!(scored.risk_factors[2], "Inactive for 999 days");
    }

    #[test]
    fn levels_follow_thresholds() {
        assert_eq!(risk_level(100), RiskLevel::High);
        assert_eq!(risk_level(70), RiskLevel::High);
        assert_eq!(risk_level(69), RiskLevel::Medium);
        assert_eq!(risk_level(50), RiskLevel::Medium);
        assert_eq!(risk_level(49), RiskLevel::Low);
        assert_eq!(risk_level(40), RiskLevel::Low);
    }

    #[test]
    fn results_sorted_by_score_and_filtered_by_group() {
        let mut other = student("s3", &[]);
        other.group_ids = vec!["g2".to_string()];
        let students = vec![
            // 15 + 25 = 40
            student("s1", &[(1, Some(2.0)), (1, Some(2.0)), (1, Some(2.0))]),
            student("s2", &[(20, Some(2.0))]),
            other,
        ];

        let flagged = score_at_risk(&students, None, &FixedClock(now()));
        let ids: Vec<&str> = flagged.iter().map(|s| s.student_id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s3", "s1"]);
        assert_eq!(flagged[2].risk_score, 40);
        assert_eq!(flagged[2].risk_level, RiskLevel::Low);

        let flagged = score_at_risk(&students, Some("g2"), &FixedClock(now()));
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].student_id, "s3");
    }

    #[tokio::test]
    async fn owner_only_sees_their_own_students() {
        use crate::source::{CsvSource, ObservationSource};

        let export = "\
student_id,student_name,group_id,owner_id,activity_id,created_at,quality
s1,Avery Lee,g1,t1,a1,2026-01-01T10:00:00Z,2.0
s3,Kiara Patel,g2,t2,,,
";
        let source = CsvSource::from_reader(export.as_bytes()).unwrap();
        let clock = FixedClock(now());
        let students = source.students(None).await.unwrap();
        assert_eq!(students.len(), 2);

        let owned = source.owned_groups("t1", now()).await.unwrap().unwrap();
        let flagged = score_owned_at_risk(&students, &owned.group_ids, None, &clock);
        let ids: Vec<&str> = flagged.iter().map(|s| s.student_id.as_str()).collect();
        assert_eq!(ids, vec!["s1"]);

        assert!(score_owned_at_risk(&students, &owned.group_ids, Some("g2"), &clock).is_empty());
        assert!(score_owned_at_risk(&students, &[], None, &clock).is_empty());
    }
}
