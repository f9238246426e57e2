use std::collections::HashMap;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::models::{Observation, TimingSlot};

pub const MAX_SLOTS: usize = 20;
const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// How much a single question contributes to its slot's engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TimingWeight {
    /// Every question counts as 1.
    #[default]
    Uniform,
    /// Questions count by their evaluation score; unscored ones count 0.
    Quality,
}

impl TimingWeight {
    fn weigh(self, obs: &Observation) -> f64 {
        match self {
            TimingWeight::Uniform => 1.0,
            TimingWeight::Quality => obs.quality.unwrap_or(0.0),
        }
    }
}

pub fn optimal_timing(observations: &[Observation], weight: TimingWeight) -> Vec<TimingSlot> {
    let mut buckets: HashMap<(u32, u32), (usize, f64)> = HashMap::new();
    for obs in observations {
        let key = (
            obs.created_at.weekday().num_days_from_sunday(),
            obs.created_at.hour(),
        );
        let entry = buckets.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += weight.weigh(obs);
    }

    let mut slots: Vec<TimingSlot> = buckets
        .into_iter()
        .map(|((day, hour), (count, engagement_sum))| TimingSlot {
            day_of_week: day,
            day_name: DAY_NAMES[day as usize].to_string(),
            hour,
            count,
            engagement_sum,
            engagement_score: engagement_sum / count as f64,
        })
        .collect();

    slots.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| {
                b.engagement_score
                    .partial_cmp(&a.engagement_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.day_of_week.cmp(&b.day_of_week))
            .then_with(|| a.hour.cmp(&b.hour))
    });
    slots.truncate(MAX_SLOTS);
    slots
}
