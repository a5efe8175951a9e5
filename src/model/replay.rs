use crate::{
    model::{
        error::{Entity, RatingError, Result},
        glicko::{self, ReplayStep},
        parameters::ParameterStore,
        rating_tracker::RatingTracker,
        structures::{
            comparison::Comparison,
            rating::{Rating, RatingState},
            ItemId, ParameterSetId
        }
    },
    utils::progress_utils::progress_bar
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Everything needed to rebuild one item's rating from scratch
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHistory {
    pub item_id: ItemId,
    pub initialized_with: ParameterSetId,
    pub initial: RatingState,
    pub steps: Vec<ReplayStep>,
    pub last_compared: Option<DateTime<Utc>>
}

impl ItemHistory {
    pub fn replay(&self) -> Rating {
        let mut rating = Rating::new(self.item_id, glicko::replay(&self.steps, self.initial), self.initialized_with);

        rating.comparisons = self.steps.len() as i64;
        rating.wins = self.steps.iter().filter(|s| s.score > 0.5).count() as i64;
        rating.losses = self.steps.iter().filter(|s| s.score < 0.5).count() as i64;
        rating.draws = self.steps.iter().filter(|s| s.score == 0.5).count() as i64;
        rating.last_compared = self.last_compared;
        rating
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingMismatch {
    pub item_id: ItemId,
    pub stored: Rating,
    pub replayed: Rating
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub checked: usize,
    pub mismatches: Vec<RatingMismatch>
}

impl VerificationReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Rebuilds ratings from the valid ledger.
///
/// A single item's history cannot be replayed in isolation: each step needs
/// the opponent's state at that moment, which depends on the opponent's own
/// corrected history. So the whole valid ledger is walked in creation order,
/// every item starting from the defaults of the parameter set it was
/// initialized with, and each step uses the system constant of the
/// comparison's own parameter set.
pub struct ReplayEngine<'a> {
    parameters: &'a ParameterStore
}

impl<'a> ReplayEngine<'a> {
    pub fn new(parameters: &'a ParameterStore) -> ReplayEngine<'a> {
        ReplayEngine { parameters }
    }

    /// Per-item histories for every rated item. Invalid comparisons are skipped.
    pub fn histories<'c>(
        &self,
        ratings: &RatingTracker,
        comparisons: impl IntoIterator<Item = &'c Comparison>
    ) -> Result<IndexMap<ItemId, ItemHistory>> {
        let mut histories = IndexMap::with_capacity(ratings.len());
        let mut current: HashMap<ItemId, RatingState> = HashMap::with_capacity(ratings.len());

        for rating in ratings.iter() {
            let set = self.parameters.get(rating.initialized_with)?;
            let initial = glicko::default_rating(&set.values);

            current.insert(rating.item_id, initial);
            histories.insert(
                rating.item_id,
                ItemHistory {
                    item_id: rating.item_id,
                    initialized_with: set.id,
                    initial,
                    steps: Vec::new(),
                    last_compared: None
                }
            );
        }

        for comparison in comparisons.into_iter().filter(|c| c.is_valid) {
            let system_constant = self.parameters.get(comparison.parameter_set_id)?.values.system_constant;
            let a_state = *current
                .get(&comparison.item_a)
                .ok_or_else(|| RatingError::not_found(Entity::Rating, comparison.item_a))?;
            let b_state = *current
                .get(&comparison.item_b)
                .ok_or_else(|| RatingError::not_found(Entity::Rating, comparison.item_b))?;

            let step_a = ReplayStep {
                opponent: b_state,
                score: comparison.outcome,
                system_constant
            };
            let step_b = ReplayStep {
                opponent: a_state,
                score: 1.0 - comparison.outcome,
                system_constant
            };

            current.insert(comparison.item_a, glicko::step(&a_state, &step_a));
            current.insert(comparison.item_b, glicko::step(&b_state, &step_b));

            for (item_id, step) in [(comparison.item_a, step_a), (comparison.item_b, step_b)] {
                if let Some(history) = histories.get_mut(&item_id) {
                    history.steps.push(step);
                    history.last_compared = Some(comparison.created_at);
                }
            }
        }

        Ok(histories)
    }

    /// Replayed ratings for every rated item
    pub fn recompute<'c>(
        &self,
        ratings: &RatingTracker,
        comparisons: impl IntoIterator<Item = &'c Comparison>
    ) -> Result<Vec<Rating>> {
        Ok(self
            .histories(ratings, comparisons)?
            .values()
            .map(|h| h.replay())
            .collect())
    }

    /// Replays every item in parallel and reports any stored rating that differs.
    pub fn verify<'c>(
        &self,
        ratings: &RatingTracker,
        comparisons: impl IntoIterator<Item = &'c Comparison>
    ) -> Result<VerificationReport> {
        let histories = self.histories(ratings, comparisons)?;
        let histories = histories.values().collect::<Vec<_>>();

        info!("Verifying {} ratings against the ledger...", histories.len());
        let bar = progress_bar(histories.len() as u64, "Replaying ratings".to_string());

        let mut mismatches = histories
            .par_iter()
            .filter_map(|history| {
                let replayed = history.replay();
                bar.inc(1);

                match ratings.get(history.item_id) {
                    Ok(stored) if *stored == replayed => None,
                    Ok(stored) => Some(RatingMismatch {
                        item_id: history.item_id,
                        stored: stored.clone(),
                        replayed
                    }),
                    Err(_) => None
                }
            })
            .collect::<Vec<_>>();
        mismatches.sort_by_key(|m| m.item_id);

        bar.finish_and_clear();
        info!(checked = histories.len(), mismatches = mismatches.len(), "Verification complete");

        Ok(VerificationReport {
            checked: histories.len(),
            mismatches
        })
    }
}
