use super::{outcome_level::OutcomeLevel, rating::RatingState, ComparisonId, ItemId, ParameterSetId};
use crate::model::constants::{UPSET_HIGH_EXPECTATION, UPSET_LOW_EXPECTATION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form metadata about where a judgment came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonContext {
    pub source: Option<String>,
    pub latency_ms: Option<i64>,
    pub environment: Option<String>,
    pub was_sequential: bool,
    pub notes: Option<String>
}

/// One recorded judgment between two canonical items.
///
/// `outcome` is item A's resolved score; the before/after states are what
/// was computed when the judgment was recorded and are never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub id: ComparisonId,
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub outcome_level: OutcomeLevel,
    pub outcome: f64,
    pub parameter_set_id: ParameterSetId,
    pub a_before: RatingState,
    pub a_after: RatingState,
    pub b_before: RatingState,
    pub b_after: RatingState,
    /// Win probability of item A before the update
    pub expected_outcome: f64,
    pub context: ComparisonContext,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    pub invalidated_at: Option<DateTime<Utc>>,
    /// The comparison this one replaced through a re-vote
    pub revote_of: Option<ComparisonId>
}

impl Comparison {
    pub fn involves(&self, item_id: ItemId) -> bool {
        self.item_a == item_id || self.item_b == item_id
    }

    pub fn was_upset(&self) -> bool {
        (self.expected_outcome < UPSET_LOW_EXPECTATION && self.outcome == 1.0)
            || (self.expected_outcome > UPSET_HIGH_EXPECTATION && self.outcome == 0.0)
    }

    pub fn rating_impact(&self) -> f64 {
        (self.a_after.rating - self.a_before.rating).abs()
    }
}
