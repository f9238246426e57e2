//! Point tiers: maps a cumulative point total onto the tier ladder.

use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::models::{LevelInfo, Tier};

#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    /// Tiers must be non-empty and strictly ascending by `min_points`.
    pub fn new(tiers: Vec<Tier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(AnalyticsError::EmptyTierTable);
        }

        for pair in tiers.windows(2) {
            if pair[1].min_points <= pair[0].min_points {
                return Err(AnalyticsError::UnorderedTiers {
                    previous: pair[0].name.clone(),
                    next: pair[1].name.clone(),
                });
            }
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn classify(&self, points: i64) -> LevelInfo {
        let index = self
            .tiers
            .iter()
            .rposition(|tier| tier.min_points <= points)
            .unwrap_or(0);
        let current = &self.tiers[index];
        let next = self.tiers.get(index + 1);

        let (progress_percentage, points_to_next) = match next {
            Some(next) => {
                let span = next.min_points.saturating_sub(current.min_points) as f64;
                let progress = points.saturating_sub(current.min_points) as f64 / span * 100.0;
                (progress.clamp(0.0, 100.0), next.min_points.saturating_sub(points))
            }
            None => (100.0, 0),
        };

        debug!(points, tier = %current.name, progress_percentage, "classified points");

        LevelInfo {
            current_tier: current.clone(),
            next_tier: next.cloned(),
            progress_percentage,
            points_to_next,
            is_max_tier: next.is_none(),
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

fn tier(
    name: &str,
    min_points: i64,
    max_points: Option<i64>,
    color: &str,
    icon: &str,
    description: &str,
) -> Tier {
    Tier {
        name: name.to_string(),
        min_points,
        max_points,
        color: color.to_string(),
        icon: icon.to_string(),
        description: description.to_string(),
    }
}

/// The built-in SMILE ladder.
pub fn default_tiers() -> Vec<Tier> {
    vec![
        tier(
            "Curious Beginner",
            0,
            Some(99),
            "#9CA3AF",
            "🌱",
            "Just starting to ask questions",
        ),
        tier(
            "Question Explorer",
            100,
            Some(299),
            "#10B981",
            "🔍",
            "Exploring topics through inquiry",
        ),
        tier(
            "Inquiry Builder",
            300,
            Some(699),
            "#3B82F6",
            "🧱",
            "Building strong, well-formed questions",
        ),
        tier(
            "Critical Thinker",
            700,
            Some(1499),
            "#8B5CF6",
            "🧠",
            "Asking questions that probe deeper",
        ),
        tier(
            "Knowledge Seeker",
            1500,
            Some(2999),
            "#F59E0B",
            "📚",
            "A consistent source of quality questions",
        ),
        tier(
            "SMILE Master",
            3000,
            None,
            "#EF4444",
            "👑",
            "Mastery of question-driven learning",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TierTable {
        TierTable::new(vec![
            tier("Bronze", 0, Some(99), "#a", "b", "bronze"),
            tier("Silver", 100, Some(249), "#b", "s", "silver"),
            tier("Gold", 250, None, "#c", "g", "gold"),
        ])
        .unwrap()
    }

    #[test]
    fn classifies_into_range() {
        let info = table().classify(150);
        assert_eq!(info.current_tier.name, "Silver");
        assert_eq!(info.next_tier.as_ref().map(|t| t.name.as_str()), Some("Gold"));
        assert_eq!(info.points_to_next, 100);
        assert!((info.progress_percentage - 100.0 / 3.0).abs() < 1e-9);
        assert!(!info.is_max_tier);
    }

    #[test]
    fn tier_boundary_starts_new_tier() {
        let info = table().classify(100);
        assert_eq!(info.current_tier.name, "Silver");
        assert_eq!(info.progress_percentage, 0.0);

        let info = table().classify(99);
        assert_eq!(info.current_tier.name, "Bronze");
        assert_eq!(info.points_to_next, 1);
    }

    #[test]
    fn max_tier_has_nothing_left() {
        let info = table().classify(250);
        assert!(info.is_max_tier);
        assert_eq!(info.points_to_next, 0);
        assert_eq!(info.progress_percentage, 100.0);
        assert!(info.next_tier.is_none());

        let info = table().classify(10_000);
        assert_eq!(info.current_tier.name, "Gold");
        assert!(info.is_max_tier);
    }

    #[test]
    fn below_lowest_tier_clamps_progress() {
        let table = TierTable::new(vec![
            tier("Starter", 10, None, "#a", "s", "starter"),
            tier("Next", 20, None, "#b", "n", "next"),
        ])
        .unwrap();
        let info = table.classify(-5);
        assert_eq!(info.current_tier.name, "Starter");
        assert_eq!(info.progress_percentage, 0.0);
        assert_eq!(info.points_to_next, 25);
    }

    #[test]
    fn extreme_totals_do_not_overflow() {
        let table = TierTable::default();

        let info = table.classify(i64::MIN);
        assert_eq!(info.current_tier.name, "Curious Beginner");
        assert_eq!(info.progress_percentage, 0.0);
        assert_eq!(info.points_to_next, i64::MAX);

        let info = table.classify(i64::MAX);
        assert_eq!(info.current_tier.name, "SMILE Master");
        assert_eq!(info.points_to_next, 0);
    }

    #[test]
    fn current_tier_is_monotonic_in_points() {
        let table = TierTable::default();
        let mut previous = i64::MIN;
        for points in (0..4000).step_by(7) {
            let min = table.classify(points).current_tier.min_points;
            assert!(min >= previous);
            previous = min;
        }
    }

    #[test]
    fn rejects_empty_table() {
        assert!(matches!(
            TierTable::new(Vec::new()),
            Err(AnalyticsError::EmptyTierTable)
        ));
    }

    #[test]
    fn rejects_unordered_table() {
        let result = TierTable::new(vec![
            tier("High", 100, None, "#a", "h", "high"),
            tier("Low", 100, None, "#b", "l", "low"),
        ]);
        assert!(matches!(result, Err(AnalyticsError::UnorderedTiers { .. })));
    }

    #[test]
    fn default_ladder_is_valid() {
        let tiers = default_tiers();
        assert!(TierTable::new(tiers.clone()).is_ok());
        assert_eq!(tiers[0].min_points, 0);
    }
}
