use crate::{
    config::EngineConfig,
    model::{
        clock::{Clock, SystemClock},
        error::{RatingError, Result},
        glicko,
        identity::{Item, ItemRegistry, ItemRelationship},
        ledger::ComparisonLedger,
        locks::{lock, read, write, ItemLocks},
        parameters::{ParameterSet, ParameterStore, ParameterValues},
        passive::PassiveEventLog,
        rating_tracker::RatingTracker,
        replay::{ReplayEngine, VerificationReport},
        structures::{
            comparison::{Comparison, ComparisonContext},
            outcome_level::OutcomeLevel,
            passive_event::{PassiveEvent, PassiveEventDetails},
            rating::{LeaderboardEntry, Rating},
            relationship_kind::RelationshipKind,
            snapshot::EngineSnapshot,
            ComparisonId, ItemId
        }
    }
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::sync::{Mutex, RwLock};
use strum::IntoEnumIterator;
use tracing::{info, warn};

/// Result of a successful undo: the invalidated comparison and every rating
/// that replay rewrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndoOutcome {
    pub comparison: Comparison,
    pub ratings: Vec<Rating>
}

/// What each possible judgment of a pair would do to both ratings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomePreview {
    pub level: OutcomeLevel,
    pub label: String,
    pub score: f64,
    pub a_change: f64,
    pub b_change: f64
}

/// Entry point of the engine.
///
/// Ratings only change in two places: `record_comparison` (a forward update
/// of exactly the two named items) and the replay inside `undo`.
///
/// Locking: recording holds the engine gate shared plus the two item locks;
/// undo, alias linking and parameter rotation hold the gate exclusively.
/// Inner stores are always taken in the order registry, parameters,
/// ratings, ledger, passive log.
pub struct ComparisonService<C: Clock = SystemClock> {
    config: EngineConfig,
    clock: C,
    gate: RwLock<()>,
    item_locks: ItemLocks,
    parameters: RwLock<ParameterStore>,
    registry: RwLock<ItemRegistry>,
    ratings: RwLock<RatingTracker>,
    ledger: RwLock<ComparisonLedger>,
    passive: Mutex<PassiveEventLog>
}

impl ComparisonService<SystemClock> {
    pub fn new(config: EngineConfig, values: ParameterValues) -> Result<Self> {
        Self::with_clock(config, values, SystemClock)
    }
}

impl<C: Clock> ComparisonService<C> {
    /// An empty engine whose parameter store is seeded with `values`.
    pub fn with_clock(config: EngineConfig, values: ParameterValues, clock: C) -> Result<Self> {
        let parameters = ParameterStore::seeded(values, clock.now())?;

        Self::assemble(
            config,
            clock,
            parameters,
            ItemRegistry::new(),
            RatingTracker::new(),
            ComparisonLedger::new(),
            PassiveEventLog::new()
        )
    }

    /// Rebuilds the engine from persisted state, rejecting anything that
    /// the engine cannot hold.
    pub fn from_snapshot(snapshot: EngineSnapshot, config: EngineConfig, clock: C) -> Result<Self> {
        let parameters = ParameterStore::from_sets(snapshot.parameter_sets)?;
        parameters.get_active()?;

        let registry = ItemRegistry::from_parts(snapshot.items, snapshot.relationships)?;

        for rating in &snapshot.ratings {
            Self::require_canonical(&registry, rating.item_id)?;
            parameters.get(rating.initialized_with).map_err(invalid_state)?;
        }
        if snapshot.ratings.iter().map(|r| r.item_id).unique().count() != snapshot.ratings.len() {
            return Err(RatingError::ConfigurationError("duplicate ratings in snapshot".to_string()));
        }
        let ratings = RatingTracker::from_ratings(snapshot.ratings);

        for comparison in &snapshot.comparisons {
            parameters.get(comparison.parameter_set_id).map_err(invalid_state)?;
            for item_id in [comparison.item_a, comparison.item_b] {
                Self::require_canonical(&registry, item_id)?;
                if comparison.is_valid && !ratings.contains(item_id) {
                    return Err(RatingError::ConfigurationError(format!(
                        "comparison {} names item {} which has no rating",
                        comparison.id, item_id
                    )));
                }
            }
        }
        let ledger = ComparisonLedger::from_comparisons(snapshot.comparisons)?;

        for event in &snapshot.passive_events {
            registry.get(event.item_id).map_err(invalid_state)?;
        }
        let passive = PassiveEventLog::from_events(snapshot.passive_events);

        info!(
            items = registry.items().count(),
            ratings = ratings.len(),
            comparisons = ledger.len(),
            "Loaded engine state"
        );

        Self::assemble(config, clock, parameters, registry, ratings, ledger, passive)
    }

    fn assemble(
        config: EngineConfig,
        clock: C,
        parameters: ParameterStore,
        registry: ItemRegistry,
        ratings: RatingTracker,
        ledger: ComparisonLedger,
        passive: PassiveEventLog
    ) -> Result<Self> {
        if config.undo_window < chrono::Duration::zero() {
            return Err(RatingError::ConfigurationError("undo window cannot be negative".to_string()));
        }

        Ok(ComparisonService {
            item_locks: ItemLocks::new(config.lock_timeout),
            config,
            clock,
            gate: RwLock::new(()),
            parameters: RwLock::new(parameters),
            registry: RwLock::new(registry),
            ratings: RwLock::new(ratings),
            ledger: RwLock::new(ledger),
            passive: Mutex::new(passive)
        })
    }

    fn require_canonical(registry: &ItemRegistry, item_id: ItemId) -> Result<()> {
        let item = registry.get(item_id).map_err(invalid_state)?;
        if !item.is_canonical() {
            return Err(RatingError::ConfigurationError(format!(
                "alias {} cannot carry a rating or appear in a comparison",
                item_id
            )));
        }
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Registers an imported item and gives it a rating under the active parameters.
    pub fn register_item(&self, id: ItemId, title: &str) -> Result<Item> {
        let _gate = read(&self.gate, "engine gate")?;

        let mut registry = write(&self.registry, "item registry")?;
        let active = read(&self.parameters, "parameter store")?.get_active()?.clone();
        let item = registry.register(id, title, self.clock.now())?;
        write(&self.ratings, "rating store")?.get_or_initialize(id, &active);

        info!(item_id = id, title, "Registered item");
        Ok(item)
    }

    pub fn record_comparison(
        &self,
        item_a: ItemId,
        item_b: ItemId,
        level: OutcomeLevel,
        context: ComparisonContext
    ) -> Result<Comparison> {
        self.record(item_a, item_b, level, context, None)
    }

    fn record(
        &self,
        item_a_ref: ItemId,
        item_b_ref: ItemId,
        level: OutcomeLevel,
        context: ComparisonContext,
        revote_of: Option<ComparisonId>
    ) -> Result<Comparison> {
        let _gate = read(&self.gate, "engine gate")?;

        let (item_a, item_b) = {
            let registry = read(&self.registry, "item registry")?;
            (registry.resolve_canonical(item_a_ref)?, registry.resolve_canonical(item_b_ref)?)
        };
        if item_a == item_b {
            return Err(RatingError::InvalidComparison(format!(
                "items {} and {} are the same recording ({})",
                item_a_ref, item_b_ref, item_a
            )));
        }

        let _items = self.item_locks.acquire(&[item_a, item_b])?;

        let active = read(&self.parameters, "parameter store")?.get_active()?.clone();
        let (mut rating_a, mut rating_b) = {
            let mut ratings = write(&self.ratings, "rating store")?;
            (
                ratings.get_or_initialize(item_a, &active),
                ratings.get_or_initialize(item_b, &active)
            )
        };

        let outcome = glicko::resolve_outcome(level, &active.values);
        let expected_outcome = glicko::win_probability(&rating_a.state, &rating_b.state);
        let (a_after, b_after) = glicko::update(&rating_a.state, &rating_b.state, outcome, &active.values);

        let mut ratings = write(&self.ratings, "rating store")?;
        let mut ledger = write(&self.ledger, "comparison ledger")?;

        let comparison = ledger.append(Comparison {
            id: 0,
            item_a,
            item_b,
            outcome_level: level,
            outcome,
            parameter_set_id: active.id,
            a_before: rating_a.state,
            a_after,
            b_before: rating_b.state,
            b_after,
            expected_outcome,
            context,
            is_valid: true,
            created_at: self.clock.now(),
            invalidated_at: None,
            revote_of
        });

        rating_a.apply(a_after, outcome, comparison.created_at);
        rating_b.apply(b_after, 1.0 - outcome, comparison.created_at);
        ratings.put(rating_a);
        ratings.put(rating_b);

        info!(
            comparison_id = comparison.id,
            item_a,
            item_b,
            outcome,
            level = %level,
            upset = comparison.was_upset(),
            impact = comparison.rating_impact(),
            "Recorded comparison"
        );
        Ok(comparison)
    }

    /// Stores a listening signal. Ratings, the ledger and rating math are never touched.
    pub fn record_passive_event(&self, item: ItemId, details: PassiveEventDetails) -> Result<PassiveEvent> {
        let canonical = read(&self.registry, "item registry")?.resolve_canonical(item)?;
        let event = lock(&self.passive, "passive event log")?.append(item, canonical, details, self.clock.now());

        info!(item_id = item, kind = %event.details.kind, "Recorded passive event");
        Ok(event)
    }

    /// Soft-deletes a comparison and replays the ledger without it.
    ///
    /// An undo requested exactly `undo_window` after creation is accepted.
    pub fn undo(&self, comparison_id: ComparisonId, requested_at: DateTime<Utc>) -> Result<UndoOutcome> {
        let _gate = write(&self.gate, "engine gate")?;

        let comparison = read(&self.ledger, "comparison ledger")?.get(comparison_id)?.clone();
        if !comparison.is_valid {
            warn!(comparison_id, "Rejected undo: comparison already undone");
            return Err(RatingError::AlreadyInvalid(comparison_id));
        }

        let elapsed = requested_at - comparison.created_at;
        if elapsed > self.config.undo_window {
            warn!(
                comparison_id,
                elapsed_ms = elapsed.num_milliseconds(),
                "Rejected undo: window expired"
            );
            return Err(RatingError::UndoWindowExpired {
                comparison_id,
                elapsed_ms: elapsed.num_milliseconds(),
                window_ms: self.config.undo_window.num_milliseconds()
            });
        }

        let _items = self.item_locks.acquire(&[comparison.item_a, comparison.item_b])?;

        let parameters = read(&self.parameters, "parameter store")?;
        let mut ratings = write(&self.ratings, "rating store")?;
        let mut ledger = write(&self.ledger, "comparison ledger")?;

        let replayed = ReplayEngine::new(&parameters).recompute(
            &ratings,
            ledger.valid_in_order().filter(|c| c.id != comparison_id)
        )?;
        let invalidated = ledger.invalidate(comparison_id, self.clock.now())?;

        let mut rewritten = Vec::new();
        for rating in replayed {
            let named = invalidated.involves(rating.item_id);
            let changed = ratings.get(rating.item_id).map(|r| *r != rating).unwrap_or(true);
            if named || changed {
                ratings.put(rating.clone());
                rewritten.push(rating);
            }
        }

        info!(
            comparison_id,
            item_a = invalidated.item_a,
            item_b = invalidated.item_b,
            rewritten = rewritten.len(),
            "Undid comparison"
        );
        Ok(UndoOutcome {
            comparison: invalidated,
            ratings: rewritten
        })
    }

    /// Undo, then record the same pair anew. Fails without recording if the undo is rejected.
    pub fn revote(
        &self,
        comparison_id: ComparisonId,
        level: OutcomeLevel,
        context: ComparisonContext
    ) -> Result<Comparison> {
        let undone = self.undo(comparison_id, self.clock.now())?;
        let comparison = self.record(
            undone.comparison.item_a,
            undone.comparison.item_b,
            level,
            context,
            Some(comparison_id)
        )?;

        info!(
            original = comparison_id,
            replacement = comparison.id,
            level = %level,
            "Re-voted comparison"
        );
        Ok(comparison)
    }

    pub fn get_rating(&self, item: ItemId) -> Result<Rating> {
        let canonical = read(&self.registry, "item registry")?.resolve_canonical(item)?;
        Ok(read(&self.ratings, "rating store")?.get(canonical)?.clone())
    }

    /// Comparisons naming the item's canonical identity, oldest first.
    /// Invalidated ones are included only when `include_invalid` is set.
    pub fn get_comparison_history(&self, item: ItemId, include_invalid: bool) -> Result<Vec<Comparison>> {
        let canonical = read(&self.registry, "item registry")?.resolve_canonical(item)?;
        Ok(read(&self.ledger, "comparison ledger")?.history_for(canonical, include_invalid))
    }

    pub fn get_comparison(&self, comparison_id: ComparisonId) -> Result<Comparison> {
        Ok(read(&self.ledger, "comparison ledger")?.get(comparison_id)?.clone())
    }

    pub fn get_item(&self, item: ItemId) -> Result<Item> {
        Ok(read(&self.registry, "item registry")?.get(item)?.clone())
    }

    /// Makes `alias` share `canonical`'s rating. Items that already have
    /// comparison history are rejected rather than merged.
    pub fn link_as_canonical_alias(&self, alias: ItemId, canonical: ItemId) -> Result<()> {
        let _gate = write(&self.gate, "engine gate")?;

        let mut registry = write(&self.registry, "item registry")?;
        let mut ratings = write(&self.ratings, "rating store")?;
        let ledger = read(&self.ledger, "comparison ledger")?;

        registry.get(alias)?;
        registry.get(canonical)?;
        if ledger.has_history(alias) {
            return Err(RatingError::InvalidLink(format!(
                "item {} already has comparison history and cannot become an alias",
                alias
            )));
        }

        registry.link_as_canonical_alias(alias, canonical)?;
        if ratings.remove(alias).is_some() {
            info!(alias, canonical, "Removed rating of aliased item");
        }

        Ok(())
    }

    pub fn link_other_relationship(&self, a: ItemId, b: ItemId, kind: RelationshipKind) -> Result<ItemRelationship> {
        write(&self.registry, "item registry")?.link_other_relationship(a, b, kind, self.clock.now())
    }

    pub fn relationships_for(&self, item: ItemId) -> Result<Vec<ItemRelationship>> {
        let registry = read(&self.registry, "item registry")?;
        let canonical = registry.resolve_canonical(item)?;
        Ok(registry.relationships_for(canonical))
    }

    pub fn rotate_parameters(&self, values: ParameterValues, reason: &str) -> Result<ParameterSet> {
        let _gate = write(&self.gate, "engine gate")?;
        write(&self.parameters, "parameter store")?.rotate(values, reason, self.clock.now())
    }

    pub fn active_parameters(&self) -> Result<ParameterSet> {
        Ok(read(&self.parameters, "parameter store")?.get_active()?.clone())
    }

    pub fn parameter_history(&self) -> Result<Vec<ParameterSet>> {
        Ok(read(&self.parameters, "parameter store")?.history())
    }

    pub fn passive_events(&self, item: ItemId) -> Result<Vec<PassiveEvent>> {
        let canonical = read(&self.registry, "item registry")?.resolve_canonical(item)?;
        Ok(lock(&self.passive, "passive event log")?.events_for(canonical))
    }

    pub fn leaderboard(&self, min_comparisons: i64) -> Result<Vec<LeaderboardEntry>> {
        Ok(read(&self.ratings, "rating store")?.leaderboard(min_comparisons))
    }

    /// Rating changes for every outcome level of `item_a` against `item_b`,
    /// under the active parameters. Nothing is recorded.
    pub fn preview_comparison(&self, item_a: ItemId, item_b: ItemId) -> Result<Vec<OutcomePreview>> {
        let (a, b) = {
            let registry = read(&self.registry, "item registry")?;
            (registry.resolve_canonical(item_a)?, registry.resolve_canonical(item_b)?)
        };
        if a == b {
            return Err(RatingError::InvalidComparison(format!(
                "items {} and {} are the same recording ({})",
                item_a, item_b, a
            )));
        }

        let active = read(&self.parameters, "parameter store")?.get_active()?.clone();
        let ratings = read(&self.ratings, "rating store")?;
        let state_of = |id: ItemId| match ratings.get(id) {
            Ok(rating) => rating.state,
            Err(_) => glicko::default_rating(&active.values)
        };
        let (state_a, state_b) = (state_of(a), state_of(b));

        Ok(OutcomeLevel::iter()
            .map(|level| {
                let score = glicko::resolve_outcome(level, &active.values);
                OutcomePreview {
                    level,
                    label: level.label().to_string(),
                    score,
                    a_change: glicko::expected_rating_change(&state_a, &state_b, score, &active.values),
                    b_change: glicko::expected_rating_change(&state_b, &state_a, 1.0 - score, &active.values)
                }
            })
            .collect())
    }

    /// Replays the whole ledger and compares against the stored ratings.
    pub fn verify(&self) -> Result<VerificationReport> {
        let _gate = read(&self.gate, "engine gate")?;

        let parameters = read(&self.parameters, "parameter store")?;
        let ratings = read(&self.ratings, "rating store")?;
        let ledger = read(&self.ledger, "comparison ledger")?;

        ReplayEngine::new(&parameters).verify(&ratings, ledger.iter())
    }

    pub fn snapshot(&self) -> Result<EngineSnapshot> {
        let _gate = read(&self.gate, "engine gate")?;

        let registry = read(&self.registry, "item registry")?;
        let parameters = read(&self.parameters, "parameter store")?;
        let ratings = read(&self.ratings, "rating store")?;
        let ledger = read(&self.ledger, "comparison ledger")?;
        let passive = lock(&self.passive, "passive event log")?;

        Ok(EngineSnapshot {
            parameter_sets: parameters.history(),
            items: registry.items().cloned().collect(),
            relationships: registry.relationships().to_vec(),
            ratings: ratings.iter().cloned().collect(),
            comparisons: ledger.iter().cloned().collect(),
            passive_events: passive.events().to_vec()
        })
    }
}

fn invalid_state(error: RatingError) -> RatingError {
    RatingError::ConfigurationError(format!("inconsistent state: {}", error))
}
