use crate::{
    config::EngineConfig,
    model::{
        clock::ManualClock,
        comparison_service::ComparisonService,
        parameters::ParameterValues,
        structures::{
            comparison::{Comparison, ComparisonContext},
            outcome_level::OutcomeLevel,
            rating::{Rating, RatingState},
            ItemId
        }
    }
};
use chrono::{DateTime, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fixed starting point for manual clocks
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().unwrap_or_else(Utc::now)
}

/// A service on a manual clock with items `1..=n_items` registered
pub fn generate_service(n_items: i64) -> ComparisonService<ManualClock> {
    generate_service_with(n_items, EngineConfig::default(), ParameterValues::default())
}

pub fn generate_service_with(
    n_items: i64,
    config: EngineConfig,
    values: ParameterValues
) -> ComparisonService<ManualClock> {
    let service = ComparisonService::with_clock(config, values, ManualClock::new(test_epoch()))
        .expect("Failed to create comparison service");

    for id in 1..=n_items {
        service
            .register_item(id, &format!("Song {}", id))
            .expect("Failed to register item");
    }

    service
}

pub fn generate_rating(item_id: ItemId, rating: f64, deviation: f64) -> Rating {
    Rating::new(item_id, RatingState::new(rating, deviation, 0.06), 1)
}

/// A comparison between two default-rated items, before/after left equal
pub fn generate_comparison(id: i64, item_a: ItemId, item_b: ItemId, level: OutcomeLevel, outcome: f64) -> Comparison {
    let state = RatingState::new(1500.0, 350.0, 0.06);

    Comparison {
        id,
        item_a,
        item_b,
        outcome_level: level,
        outcome,
        parameter_set_id: 1,
        a_before: state,
        a_after: state,
        b_before: state,
        b_after: state,
        expected_outcome: 0.5,
        context: ComparisonContext::default(),
        is_valid: true,
        created_at: Utc::now(),
        invalidated_at: None,
        revote_of: None
    }
}

pub fn generate_context(source: &str) -> ComparisonContext {
    ComparisonContext {
        source: Some(source.to_string()),
        latency_ms: Some(1200),
        environment: Some("test".to_string()),
        was_sequential: false,
        notes: None
    }
}

/// A reproducible stream of judgments between items `1..=n_items`, never pairing an item with itself.
///
/// Test helper; `n_items` must be at least 2.
pub fn generate_judgments(n: usize, n_items: i64, seed: u64) -> Vec<(ItemId, ItemId, OutcomeLevel)> {
    assert!(n_items >= 2, "At least two items are needed to generate judgments");

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut judgments = Vec::with_capacity(n);

    while judgments.len() < n {
        let a = rng.random_range(1..=n_items);
        let b = rng.random_range(1..=n_items);
        if a == b {
            continue;
        }

        let level = match OutcomeLevel::try_from(rng.random_range(0..5)) {
            Ok(level) => level,
            Err(_) => OutcomeLevel::Tie
        };
        judgments.push((a, b, level));
    }

    judgments
}
