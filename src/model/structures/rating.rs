use super::{confidence_level::ConfidenceLevel, ItemId, ParameterSetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The Glicko-2 triple on the displayed scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingState {
    pub rating: f64,
    pub deviation: f64,
    pub volatility: f64
}

impl RatingState {
    pub fn new(rating: f64, deviation: f64, volatility: f64) -> Self {
        RatingState {
            rating,
            deviation,
            volatility
        }
    }

    /// Roughly 95% interval, `rating ± 2 * deviation`
    pub fn confidence_interval(&self) -> (f64, f64) {
        (self.rating - 2.0 * self.deviation, self.rating + 2.0 * self.deviation)
    }
}

/// Current state of one canonical item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub item_id: ItemId,
    pub state: RatingState,
    /// Number of valid comparisons folded into `state`
    pub comparisons: i64,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    pub last_compared: Option<DateTime<Utc>>,
    /// Parameter set whose defaults seeded this rating
    pub initialized_with: ParameterSetId
}

impl Rating {
    pub fn new(item_id: ItemId, state: RatingState, initialized_with: ParameterSetId) -> Self {
        Rating {
            item_id,
            state,
            comparisons: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            last_compared: None,
            initialized_with
        }
    }

    /// Folds one applied comparison into the counters. `score` is this item's score.
    pub fn apply(&mut self, state: RatingState, score: f64, at: DateTime<Utc>) {
        self.state = state;
        self.comparisons += 1;
        if score > 0.5 {
            self.wins += 1;
        } else if score < 0.5 {
            self.losses += 1;
        } else {
            self.draws += 1;
        }
        self.last_compared = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub percentile: f64,
    pub confidence: ConfidenceLevel,
    pub rating: Rating
}
