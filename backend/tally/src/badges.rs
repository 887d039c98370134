//! # Badges
//!
//! Badge tiers earned from activity counts.
//!
//! Each criterion is checked against every tier threshold for its kind. A single criterion
//! can land in several tiers at once, and duplicate kinds are counted independently.
//!
//! ## Default Criteria
//!
//! | Kind             | Bronze | Silver | Gold    |
//! |------------------|--------|--------|---------|
//! | QUESTION_COUNT   | 10     | 50     | 100     |
//! | ANSWER_COUNT     | 10     | 50     | 100     |
//! | QUESTION_UPVOTES | 10     | 50     | 100     |
//! | ANSWER_UPVOTES   | 10     | 50     | 100     |
//! | TOTAL_VIEWS      | 1000   | 10000  | 100000  |
use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionKind {
    QuestionCount,
    AnswerCount,
    QuestionUpvotes,
    AnswerUpvotes,
    TotalViews,
}

impl fmt::Display for CriterionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CriterionKind::QuestionCount => "QUESTION_COUNT",
            CriterionKind::AnswerCount => "ANSWER_COUNT",
            CriterionKind::QuestionUpvotes => "QUESTION_UPVOTES",
            CriterionKind::AnswerUpvotes => "ANSWER_UPVOTES",
            CriterionKind::TotalViews => "TOTAL_VIEWS",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Gold,
    Silver,
    Bronze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCriterion {
    #[serde(rename = "type")]
    pub kind: CriterionKind,
    pub count: u64,
}

impl ActivityCriterion {
    pub fn new(kind: CriterionKind, count: u64) -> Self {
        Self { kind, count }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct BadgeCounts {
    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,
}

impl BadgeCounts {
    fn award(&mut self, tier: Tier) {
        match tier {
            Tier::Gold => self.gold += 1,
            Tier::Silver => self.silver += 1,
            Tier::Bronze => self.bronze += 1,
        }
    }
}

/// What to do with a criterion whose kind has no thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgePolicy {
    /// Contributes nothing.
    #[default]
    Skip,
    /// Fails with [`BadgeError::InvalidCriterion`].
    Strict,
}

impl FromStr for BadgePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(BadgePolicy::Skip),
            "strict" => Ok(BadgePolicy::Strict),
            other => Err(format!("unknown badge policy '{other}', expected skip or strict")),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BadgeError {
    #[error("No badge thresholds for criterion {0}")]
    InvalidCriterion(CriterionKind),

    #[error("Malformed badge thresholds: {0}")]
    MalformedThresholds(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeThresholds(HashMap<CriterionKind, HashMap<Tier, u64>>);

impl BadgeThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: CriterionKind, bronze: u64, silver: u64, gold: u64) -> Self {
        self.0.insert(
            kind,
            HashMap::from([(Tier::Bronze, bronze), (Tier::Silver, silver), (Tier::Gold, gold)]),
        );
        self
    }

    pub fn from_json(json: &str) -> Result<Self, BadgeError> {
        serde_json::from_str(json).map_err(|e| BadgeError::MalformedThresholds(e.to_string()))
    }

    pub fn tiers(&self, kind: CriterionKind) -> Option<&HashMap<Tier, u64>> {
        self.0.get(&kind)
    }
}

pub fn default_thresholds() -> BadgeThresholds {
    BadgeThresholds::new()
        .with(CriterionKind::QuestionCount, 10, 50, 100)
        .with(CriterionKind::AnswerCount, 10, 50, 100)
        .with(CriterionKind::QuestionUpvotes, 10, 50, 100)
        .with(CriterionKind::AnswerUpvotes, 10, 50, 100)
        .with(CriterionKind::TotalViews, 1000, 10000, 100000)
}

pub fn count_badges(
    criteria: &[ActivityCriterion],
    thresholds: &BadgeThresholds,
    policy: BadgePolicy,
) -> Result<BadgeCounts, BadgeError> {
    let mut counts = BadgeCounts::default();

    for criterion in criteria {
        let Some(tiers) = thresholds.tiers(criterion.kind) else {
            match policy {
                BadgePolicy::Skip => continue,
                BadgePolicy::Strict => return Err(BadgeError::InvalidCriterion(criterion.kind)),
            }
        };

        for (&tier, &threshold) in tiers {
            if criterion.count >= threshold {
                counts.award(tier);
            }
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions_only() -> BadgeThresholds {
        BadgeThresholds::new().with(CriterionKind::QuestionCount, 1, 5, 10)
    }

    #[test]
    fn test_empty_criteria() {
        let counts = count_badges(&[], &default_thresholds(), BadgePolicy::Strict).unwrap();
        assert_eq!(counts, BadgeCounts::default());
    }

    #[test]
    fn test_multiple_tiers_from_one_criterion() {
        let criteria = [ActivityCriterion::new(CriterionKind::QuestionCount, 7)];
        let counts = count_badges(&criteria, &questions_only(), BadgePolicy::Skip).unwrap();

        assert_eq!(
            counts,
            BadgeCounts {
                gold: 0,
                silver: 1,
                bronze: 1
            }
        );
    }

    #[test]
    fn test_duplicate_kinds_counted_independently() {
        let criteria = [
            ActivityCriterion::new(CriterionKind::QuestionCount, 1),
            ActivityCriterion::new(CriterionKind::QuestionCount, 10),
        ];
        let counts = count_badges(&criteria, &questions_only(), BadgePolicy::Skip).unwrap();

        assert_eq!(
            counts,
            BadgeCounts {
                gold: 1,
                silver: 1,
                bronze: 2
            }
        );
    }

    #[test]
    fn test_missing_kind_skipped() {
        let criteria = [
            ActivityCriterion::new(CriterionKind::TotalViews, 1_000_000),
            ActivityCriterion::new(CriterionKind::QuestionCount, 5),
        ];
        let counts = count_badges(&criteria, &questions_only(), BadgePolicy::Skip).unwrap();

        assert_eq!(
            counts,
            BadgeCounts {
                gold: 0,
                silver: 1,
                bronze: 1
            }
        );
    }

    #[test]
    fn test_missing_kind_strict() {
        let criteria = [ActivityCriterion::new(CriterionKind::TotalViews, 3)];
        let result = count_badges(&criteria, &questions_only(), BadgePolicy::Strict);

        assert_eq!(
            result,
            Err(BadgeError::InvalidCriterion(CriterionKind::TotalViews))
        );
    }

    #[test]
    fn test_thresholds_from_json() {
        let json = r#"{ "ANSWER_COUNT": { "BRONZE": 2, "GOLD": 20 } }"#;
        let thresholds = BadgeThresholds::from_json(json).unwrap();

        let criteria = [ActivityCriterion::new(CriterionKind::AnswerCount, 25)];
        let counts = count_badges(&criteria, &thresholds, BadgePolicy::Strict).unwrap();

        assert_eq!(
            counts,
            BadgeCounts {
                gold: 1,
                silver: 0,
                bronze: 1
            }
        );
    }

    #[test]
    fn test_thresholds_malformed_json() {
        let result = BadgeThresholds::from_json(r#"{ "NOT_A_KIND": {} }"#);
        assert!(matches!(result, Err(BadgeError::MalformedThresholds(_))));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Strict".parse::<BadgePolicy>(), Ok(BadgePolicy::Strict));
        assert_eq!(" skip ".parse::<BadgePolicy>(), Ok(BadgePolicy::Skip));
        assert!("lenient".parse::<BadgePolicy>().is_err());
    }

    #[test]
    fn test_counts_serialize_uppercase() {
        let json = serde_json::to_value(BadgeCounts {
            gold: 1,
            silver: 2,
            bronze: 3,
        })
        .unwrap();

        assert_eq!(json, serde_json::json!({ "GOLD": 1, "SILVER": 2, "BRONZE": 3 }));
    }
}
