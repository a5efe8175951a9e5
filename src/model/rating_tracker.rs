use std::cmp::Ordering;

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;

use crate::model::{
    error::{Entity, RatingError, Result},
    glicko::{confidence, default_rating},
    parameters::ParameterSet,
    structures::{
        rating::{LeaderboardEntry, Rating},
        ItemId
    }
};

/// Current ratings, one per canonical item. Ratings are only ever replaced whole.
#[derive(Debug, Clone, Default)]
pub struct RatingTracker {
    ratings: IndexMap<ItemId, Rating>
}

impl RatingTracker {
    pub fn new() -> RatingTracker {
        RatingTracker {
            ratings: IndexMap::new()
        }
    }

    pub fn from_ratings(ratings: Vec<Rating>) -> RatingTracker {
        RatingTracker {
            ratings: ratings.into_iter().map(|r| (r.item_id, r)).collect()
        }
    }

    pub fn get(&self, item_id: ItemId) -> Result<&Rating> {
        self.ratings
            .get(&item_id)
            .ok_or_else(|| RatingError::not_found(Entity::Rating, item_id))
    }

    /// Returns the stored rating, creating it from `parameters`' defaults on first contact.
    pub fn get_or_initialize(&mut self, item_id: ItemId, parameters: &ParameterSet) -> Rating {
        self.ratings
            .entry(item_id)
            .or_insert_with(|| {
                debug!(item_id, parameter_set = parameters.id, "Initializing rating");
                Rating::new(item_id, default_rating(&parameters.values), parameters.id)
            })
            .clone()
    }

    pub fn put(&mut self, rating: Rating) {
        debug!(
            item_id = rating.item_id,
            rating = rating.state.rating,
            deviation = rating.state.deviation,
            volatility = rating.state.volatility,
            "Storing rating"
        );
        self.ratings.insert(rating.item_id, rating);
    }

    pub fn remove(&mut self, item_id: ItemId) -> Option<Rating> {
        self.ratings.shift_remove(&item_id)
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.ratings.contains_key(&item_id)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rating> {
        self.ratings.values()
    }

    /// Ratings of items with at least `min_comparisons` comparisons, highest
    /// first. Rank and percentile are taken among the listed items only.
    pub fn leaderboard(&self, min_comparisons: i64) -> Vec<LeaderboardEntry> {
        let eligible = self
            .ratings
            .values()
            .filter(|r| r.comparisons >= min_comparisons)
            .sorted_by(|a, b| b.state.rating.total_cmp(&a.state.rating).then(a.item_id.cmp(&b.item_id)))
            .collect_vec();
        let total = eligible.len();

        eligible
            .into_iter()
            .enumerate()
            .map(|(i, rating)| LeaderboardEntry {
                rank: i + 1,
                percentile: RatingTracker::percentile(i + 1, total).unwrap_or(0.0),
                confidence: confidence(rating.state.deviation),
                rating: rating.clone()
            })
            .collect()
    }

    /// `P = (N - rank) / N * 100`
    fn percentile(rank: usize, total: usize) -> Option<f64> {
        match rank.cmp(&1) {
            Ordering::Less => None,
            _ => {
                let n = total.saturating_sub(rank); // Items ranked below this one
                Some(n as f64 / total as f64 * 100.0)
            }
        }
    }
}
