use crate::model::{
    constants::{
        DEFAULT_DEVIATION, DEFAULT_RATING, DEFAULT_SYSTEM_CONSTANT, DEFAULT_VOLATILITY, MAX_SYSTEM_CONSTANT,
        MIN_SYSTEM_CONSTANT, SCORE_SLIGHT_A, SCORE_SLIGHT_B, SCORE_STRONG_A, SCORE_STRONG_B, SCORE_TIE
    },
    error::{Entity, RatingError, Result},
    structures::{outcome_level::OutcomeLevel, ParameterSetId}
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Numeric score assigned to each outcome level, from item A's side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeScores {
    pub strong_a: f64,
    pub slight_a: f64,
    pub tie: f64,
    pub slight_b: f64,
    pub strong_b: f64
}

impl OutcomeScores {
    pub fn score(&self, level: OutcomeLevel) -> f64 {
        match level {
            OutcomeLevel::StrongA => self.strong_a,
            OutcomeLevel::SlightA => self.slight_a,
            OutcomeLevel::Tie => self.tie,
            OutcomeLevel::SlightB => self.slight_b,
            OutcomeLevel::StrongB => self.strong_b
        }
    }
}

impl Default for OutcomeScores {
    fn default() -> Self {
        OutcomeScores {
            strong_a: SCORE_STRONG_A,
            slight_a: SCORE_SLIGHT_A,
            tie: SCORE_TIE,
            slight_b: SCORE_SLIGHT_B,
            strong_b: SCORE_STRONG_B
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterValues {
    pub default_rating: f64,
    pub default_deviation: f64,
    pub default_volatility: f64,
    /// Glicko-2 tau, constrains how fast volatility moves
    pub system_constant: f64,
    pub outcome_scores: OutcomeScores
}

impl Default for ParameterValues {
    fn default() -> Self {
        ParameterValues {
            default_rating: DEFAULT_RATING,
            default_deviation: DEFAULT_DEVIATION,
            default_volatility: DEFAULT_VOLATILITY,
            system_constant: DEFAULT_SYSTEM_CONSTANT,
            outcome_scores: OutcomeScores::default()
        }
    }
}

impl ParameterValues {
    pub fn validate(&self) -> Result<()> {
        if !self.default_rating.is_finite() {
            return Err(RatingError::ConfigurationError("default rating must be finite".to_string()));
        }
        if !(self.default_deviation.is_finite() && self.default_deviation > 0.0) {
            return Err(RatingError::ConfigurationError(
                "default deviation must be greater than 0".to_string()
            ));
        }
        if !(self.default_volatility.is_finite() && self.default_volatility > 0.0) {
            return Err(RatingError::ConfigurationError(
                "default volatility must be greater than 0".to_string()
            ));
        }
        if !(MIN_SYSTEM_CONSTANT..=MAX_SYSTEM_CONSTANT).contains(&self.system_constant) {
            return Err(RatingError::ConfigurationError(format!(
                "system constant {} is outside [{}, {}]",
                self.system_constant, MIN_SYSTEM_CONSTANT, MAX_SYSTEM_CONSTANT
            )));
        }

        let scores = self.outcome_scores;
        for score in [scores.strong_a, scores.slight_a, scores.tie, scores.slight_b, scores.strong_b] {
            if !(0.0..=1.0).contains(&score) {
                return Err(RatingError::ConfigurationError(format!(
                    "outcome score {} is outside [0, 1]",
                    score
                )));
            }
        }

        Ok(())
    }
}

/// A versioned bundle of constants. `active_until` is `None` while it is in force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub id: ParameterSetId,
    pub values: ParameterValues,
    pub reason: String,
    pub active_from: DateTime<Utc>,
    pub active_until: Option<DateTime<Utc>>
}

impl ParameterSet {
    pub fn is_active(&self) -> bool {
        self.active_until.is_none()
    }
}

/// Parameter history. Sets are closed and replaced, never edited.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    sets: IndexMap<ParameterSetId, ParameterSet>
}

impl ParameterStore {
    /// A store holding a single active set built from `values`
    pub fn seeded(values: ParameterValues, at: DateTime<Utc>) -> Result<ParameterStore> {
        values.validate()?;

        let mut sets = IndexMap::new();
        sets.insert(
            1,
            ParameterSet {
                id: 1,
                values,
                reason: "initial parameters".to_string(),
                active_from: at,
                active_until: None
            }
        );

        Ok(ParameterStore { sets })
    }

    /// Rebuilds a store from persisted sets. More than one open set is rejected.
    pub fn from_sets(mut sets: Vec<ParameterSet>) -> Result<ParameterStore> {
        sets.sort_by_key(|s| s.id);

        let active = sets.iter().filter(|s| s.is_active()).count();
        if active > 1 {
            return Err(RatingError::ConfigurationError(format!(
                "{} parameter sets are active, expected at most one",
                active
            )));
        }

        let mut store = IndexMap::new();
        for set in sets {
            if store.contains_key(&set.id) {
                return Err(RatingError::ConfigurationError(format!(
                    "duplicate parameter set {}",
                    set.id
                )));
            }
            store.insert(set.id, set);
        }

        Ok(ParameterStore { sets: store })
    }

    pub fn get_active(&self) -> Result<&ParameterSet> {
        self.sets
            .values()
            .find(|s| s.is_active())
            .ok_or_else(|| RatingError::ConfigurationError("no active parameter set".to_string()))
    }

    pub fn get(&self, id: ParameterSetId) -> Result<&ParameterSet> {
        self.sets
            .get(&id)
            .ok_or_else(|| RatingError::not_found(Entity::ParameterSet, id))
    }

    /// Closes the active set at `at` and opens a new one with `values`.
    pub fn rotate(&mut self, values: ParameterValues, reason: &str, at: DateTime<Utc>) -> Result<ParameterSet> {
        values.validate()?;

        let current_id = self.get_active()?.id;
        let next_id = self.sets.keys().max().copied().unwrap_or(0) + 1;

        if let Some(current) = self.sets.get_mut(&current_id) {
            current.active_until = Some(at);
        }

        let next = ParameterSet {
            id: next_id,
            values,
            reason: reason.to_string(),
            active_from: at,
            active_until: None
        };
        self.sets.insert(next_id, next.clone());

        info!(
            closed = current_id,
            opened = next_id,
            system_constant = values.system_constant,
            "Rotated parameters: {}",
            reason
        );

        Ok(next)
    }

    /// Every set, oldest first
    pub fn history(&self) -> Vec<ParameterSet> {
        self.sets.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ParameterSet, ParameterStore, ParameterValues};
    use crate::model::error::RatingError;
    use chrono::{Duration, Utc};

    #[test]
    fn test_seeded_store_has_one_active_set() {
        let now = Utc::now();
        let store = ParameterStore::seeded(ParameterValues::default(), now).unwrap();
        let active = store.get_active().unwrap();

        assert_eq!(active.id, 1);
        assert_eq!(active.active_from, now);
        assert!(active.is_active());
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_rotate_closes_previous_set() {
        let start = Utc::now();
        let later = start + Duration::hours(1);
        let mut store = ParameterStore::seeded(ParameterValues::default(), start).unwrap();

        let values = ParameterValues {
            system_constant: 0.8,
            ..ParameterValues::default()
        };
        let rotated = store.rotate(values, "faster volatility", later).unwrap();

        assert_eq!(rotated.id, 2);
        assert_eq!(store.get_active().unwrap().id, 2);
        assert_eq!(store.get(1).unwrap().active_until, Some(later));
        assert_eq!(store.get(1).unwrap().values, ParameterValues::default());
        assert_eq!(store.history().iter().filter(|s| s.is_active()).count(), 1);
    }

    #[test]
    fn test_rotate_without_active_set_fails() {
        let mut store = ParameterStore::default();
        let result = store.rotate(ParameterValues::default(), "nothing to close", Utc::now());

        assert!(matches!(result, Err(RatingError::ConfigurationError(_))));
    }

    #[test]
    fn test_rotate_rejects_invalid_values() {
        let mut store = ParameterStore::seeded(ParameterValues::default(), Utc::now()).unwrap();
        let values = ParameterValues {
            system_constant: 3.0,
            ..ParameterValues::default()
        };

        assert!(matches!(
            store.rotate(values, "too large", Utc::now()),
            Err(RatingError::ConfigurationError(_))
        ));
        assert_eq!(store.get_active().unwrap().id, 1);
    }

    #[test]
    fn test_validate() {
        assert!(ParameterValues::default().validate().is_ok());

        let mut values = ParameterValues::default();
        values.default_deviation = 0.0;
        assert!(values.validate().is_err());

        let mut values = ParameterValues::default();
        values.outcome_scores.slight_a = 1.25;
        assert!(values.validate().is_err());

        let mut values = ParameterValues::default();
        values.default_volatility = f64::NAN;
        assert!(values.validate().is_err());
    }

    #[test]
    fn test_from_sets_rejects_two_active_sets() {
        let now = Utc::now();
        let set = |id| ParameterSet {
            id,
            values: ParameterValues::default(),
            reason: "test".to_string(),
            active_from: now,
            active_until: None
        };

        assert!(matches!(
            ParameterStore::from_sets(vec![set(1), set(2)]),
            Err(RatingError::ConfigurationError(_))
        ));
    }
}
