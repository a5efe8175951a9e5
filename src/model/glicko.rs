//! Glicko-2 for a single two-item judgment.
//!
//! Everything here is pure: no clock, no randomness, no state. The
//! volatility root-finding uses a fixed tolerance and a hard iteration cap,
//! so identical inputs always give bit-identical outputs, which replay
//! depends on.

use crate::model::{
    constants::{
        CONFIDENT_DEVIATION, CONVERGENCE_TOLERANCE, GLICKO2_CENTER, GLICKO2_SCALE, MAX_VOLATILITY_ITERATIONS,
        MODERATELY_CONFIDENT_DEVIATION, VERY_CONFIDENT_DEVIATION
    },
    error::{RatingError, Result},
    parameters::ParameterValues,
    structures::{confidence_level::ConfidenceLevel, outcome_level::OutcomeLevel, rating::RatingState}
};
use std::{f64::consts::PI, str::FromStr};

/// One entry of an item's history: who it met, how it scored, and the
/// system constant in force for that comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayStep {
    pub opponent: RatingState,
    pub score: f64,
    pub system_constant: f64
}

pub fn default_rating(values: &ParameterValues) -> RatingState {
    RatingState::new(values.default_rating, values.default_deviation, values.default_volatility)
}

pub fn resolve_outcome(level: OutcomeLevel, values: &ParameterValues) -> f64 {
    values.outcome_scores.score(level)
}

/// Resolves a level given by its symbol (`strong_a`, `slight_a`, `tie`, `slight_b`, `strong_b`).
pub fn resolve_outcome_symbol(symbol: &str, values: &ParameterValues) -> Result<f64> {
    let level = OutcomeLevel::from_str(symbol)
        .map_err(|_| RatingError::InvalidComparison(format!("unrecognized outcome level '{}'", symbol)))?;

    Ok(resolve_outcome(level, values))
}

/// Applies one judgment to both sides. `outcome_for_a` is item A's score;
/// item B is rated with the complementary score.
pub fn update(a: &RatingState, b: &RatingState, outcome_for_a: f64, values: &ParameterValues) -> (RatingState, RatingState) {
    let tau = values.system_constant;
    let new_a = step(
        a,
        &ReplayStep {
            opponent: *b,
            score: outcome_for_a,
            system_constant: tau
        }
    );
    let new_b = step(
        b,
        &ReplayStep {
            opponent: *a,
            score: 1.0 - outcome_for_a,
            system_constant: tau
        }
    );

    (new_a, new_b)
}

/// Folds `step` over a chronologically ordered history.
pub fn replay(history: &[ReplayStep], defaults: RatingState) -> RatingState {
    history.iter().fold(defaults, |state, entry| step(&state, entry))
}

/// How far `item`'s rating would move if it scored `score` against
/// `opponent`. Nothing is recorded; used to show the stakes before a vote.
pub fn expected_rating_change(item: &RatingState, opponent: &RatingState, score: f64, values: &ParameterValues) -> f64 {
    let after = step(
        item,
        &ReplayStep {
            opponent: *opponent,
            score,
            system_constant: values.system_constant
        }
    );

    after.rating - item.rating
}

pub fn confidence(deviation: f64) -> ConfidenceLevel {
    if deviation < VERY_CONFIDENT_DEVIATION {
        ConfidenceLevel::VeryConfident
    } else if deviation < CONFIDENT_DEVIATION {
        ConfidenceLevel::Confident
    } else if deviation < MODERATELY_CONFIDENT_DEVIATION {
        ConfidenceLevel::ModeratelyConfident
    } else {
        ConfidenceLevel::Uncertain
    }
}

/// Probability that `item` beats `opponent`
pub fn win_probability(item: &RatingState, opponent: &RatingState) -> f64 {
    let mu = to_internal(item.rating);
    let mu_j = to_internal(opponent.rating);
    let phi_j = opponent.deviation / GLICKO2_SCALE;

    expected(mu, mu_j, g(phi_j))
}

/// The single-opponent Glicko-2 update used by both `update` and `replay`.
pub fn step(item: &RatingState, entry: &ReplayStep) -> RatingState {
    let mu = to_internal(item.rating);
    let phi = item.deviation / GLICKO2_SCALE;
    let sigma = item.volatility;

    let mu_j = to_internal(entry.opponent.rating);
    let phi_j = entry.opponent.deviation / GLICKO2_SCALE;

    let g_j = g(phi_j);
    let e = expected(mu, mu_j, g_j);
    let v = 1.0 / (g_j * g_j * e * (1.0 - e));
    let delta = v * g_j * (entry.score - e);

    let new_sigma = new_volatility(phi, sigma, delta, v, entry.system_constant);
    let phi_star = (phi * phi + new_sigma * new_sigma).sqrt();
    let new_phi = 1.0 / (1.0 / (phi_star * phi_star) + 1.0 / v).sqrt();
    let new_mu = mu + new_phi * new_phi * g_j * (entry.score - e);

    RatingState::new(
        GLICKO2_SCALE * new_mu + GLICKO2_CENTER,
        GLICKO2_SCALE * new_phi,
        new_sigma
    )
}

fn to_internal(rating: f64) -> f64 {
    (rating - GLICKO2_CENTER) / GLICKO2_SCALE
}

fn g(phi: f64) -> f64 {
    1.0 / (1.0 + 3.0 * phi * phi / (PI * PI)).sqrt()
}

fn expected(mu: f64, mu_j: f64, g_j: f64) -> f64 {
    1.0 / (1.0 + (-g_j * (mu - mu_j)).exp())
}

/// Illinois-style regula falsi on `f(x)` (Glickman, step 5).
fn new_volatility(phi: f64, sigma: f64, delta: f64, v: f64, tau: f64) -> f64 {
    let a = (sigma * sigma).ln();
    let phi_sq = phi * phi;
    let delta_sq = delta * delta;
    let tau_sq = tau * tau;

    let f = |x: f64| {
        let ex = x.exp();
        let denom = phi_sq + v + ex;
        ex * (delta_sq - phi_sq - v - ex) / (2.0 * denom * denom) - (x - a) / tau_sq
    };

    let mut big_a = a;
    let mut big_b = if delta_sq > phi_sq + v {
        (delta_sq - phi_sq - v).ln()
    } else {
        let mut k = 1.0;
        while f(a - k * tau) < 0.0 && (k as usize) < MAX_VOLATILITY_ITERATIONS {
            k += 1.0;
        }
        a - k * tau
    };

    let mut f_a = f(big_a);
    let mut f_b = f(big_b);
    let mut iterations = 0;

    while (big_b - big_a).abs() > CONVERGENCE_TOLERANCE && iterations < MAX_VOLATILITY_ITERATIONS {
        if f_b == f_a {
            break;
        }

        let big_c = big_a + (big_a - big_b) * f_a / (f_b - f_a);
        let f_c = f(big_c);

        if f_c * f_b <= 0.0 {
            big_a = big_b;
            f_a = f_b;
        } else {
            f_a /= 2.0;
        }

        big_b = big_c;
        f_b = f_c;
        iterations += 1;
    }

    (big_a / 2.0).exp()
}

#[cfg(test)]
mod tests {
    use super::{
        confidence, default_rating, expected_rating_change, replay, resolve_outcome, resolve_outcome_symbol, step,
        update, win_probability, ReplayStep
    };
    use crate::model::{
        error::RatingError,
        parameters::ParameterValues,
        structures::{confidence_level::ConfidenceLevel, outcome_level::OutcomeLevel, rating::RatingState}
    };
    use approx::assert_abs_diff_eq;
    use strum::IntoEnumIterator;

    fn defaults() -> RatingState {
        default_rating(&ParameterValues::default())
    }

    #[test]
    fn test_default_rating() {
        let state = defaults();
        assert_eq!(state, RatingState::new(1500.0, 350.0, 0.06));
    }

    #[test]
    fn test_resolve_outcome_seed_mapping() {
        let values = ParameterValues::default();
        let scores = OutcomeLevel::iter()
            .map(|level| resolve_outcome(level, &values))
            .collect::<Vec<_>>();

        assert_eq!(scores, vec![1.0, 0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_resolve_outcome_symbol() {
        let values = ParameterValues::default();
        assert_eq!(resolve_outcome_symbol("slight_a", &values), Ok(0.75));
        assert!(matches!(
            resolve_outcome_symbol("0.75", &values),
            Err(RatingError::InvalidComparison(_))
        ));
    }

    #[test]
    fn test_tie_leaves_ratings_unchanged() {
        let values = ParameterValues::default();
        let (a, b) = update(&defaults(), &defaults(), 0.5, &values);

        assert_eq!(a.rating, 1500.0);
        assert_eq!(b.rating, 1500.0);
        assert!(a.deviation < 350.0);
        assert!(b.deviation < 350.0);
    }

    #[test]
    fn test_strong_win_matches_closed_form() {
        let values = ParameterValues::default();
        let (a, b) = update(&defaults(), &defaults(), 1.0, &values);

        assert!(a.rating > b.rating);
        assert_abs_diff_eq!(a.rating, 1662.3109, epsilon = 0.001);
        assert_abs_diff_eq!(b.rating, 1337.6891, epsilon = 0.001);
        assert_abs_diff_eq!(a.deviation, 290.3190, epsilon = 0.001);
        assert_abs_diff_eq!(b.deviation, 290.3190, epsilon = 0.001);
        assert_abs_diff_eq!(a.volatility, 0.0599997, epsilon = 0.000001);
    }

    #[test]
    fn test_update_is_deterministic() {
        let values = ParameterValues::default();
        let a = RatingState::new(1720.5, 143.2, 0.0612);
        let b = RatingState::new(1388.1, 61.9, 0.0587);

        let first = update(&a, &b, 0.25, &values);
        let second = update(&a, &b, 0.25, &values);

        assert_eq!(first.0.rating.to_bits(), second.0.rating.to_bits());
        assert_eq!(first.0.deviation.to_bits(), second.0.deviation.to_bits());
        assert_eq!(first.0.volatility.to_bits(), second.0.volatility.to_bits());
        assert_eq!(first.1.rating.to_bits(), second.1.rating.to_bits());
        assert_eq!(first.1.deviation.to_bits(), second.1.deviation.to_bits());
        assert_eq!(first.1.volatility.to_bits(), second.1.volatility.to_bits());
    }

    #[test]
    fn test_update_is_total_for_extreme_inputs() {
        let values = ParameterValues::default();
        let cases = [
            (RatingState::new(3000.0, 30.0, 0.01), RatingState::new(0.0, 350.0, 0.2)),
            (RatingState::new(1500.0, 0.5, 0.001), RatingState::new(1500.0, 0.5, 0.001)),
            (RatingState::new(-500.0, 600.0, 0.9), RatingState::new(2500.0, 1.0, 0.06))
        ];

        for (a, b) in cases {
            for score in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let (new_a, new_b) = update(&a, &b, score, &values);
                for state in [new_a, new_b] {
                    assert!(state.rating.is_finite());
                    assert!(state.deviation.is_finite() && state.deviation > 0.0);
                    assert!(state.volatility.is_finite() && state.volatility > 0.0);
                }
            }
        }
    }

    #[test]
    fn test_replay_matches_forward_steps() {
        let values = ParameterValues::default();
        let opponent = RatingState::new(1600.0, 200.0, 0.06);

        let mut forward = defaults();
        let mut history = Vec::new();
        for score in [1.0, 0.25, 0.5, 0.0] {
            let entry = ReplayStep {
                opponent,
                score,
                system_constant: values.system_constant
            };
            forward = update(&forward, &opponent, score, &values).0;
            history.push(entry);
        }

        assert_eq!(replay(&history, defaults()), forward);
    }

    #[test]
    fn test_replay_empty_history_is_defaults() {
        assert_eq!(replay(&[], defaults()), defaults());
    }

    #[test]
    fn test_step_uses_entry_system_constant() {
        let opponent = RatingState::new(1300.0, 80.0, 0.06);
        let low = step(&defaults(), &ReplayStep { opponent, score: 0.0, system_constant: 0.3 });
        let high = step(&defaults(), &ReplayStep { opponent, score: 0.0, system_constant: 1.2 });

        assert_ne!(low.volatility, high.volatility);
    }

    #[test]
    fn test_win_probability() {
        assert_abs_diff_eq!(win_probability(&defaults(), &defaults()), 0.5, epsilon = 1e-12);

        let strong = RatingState::new(1900.0, 50.0, 0.06);
        let weak = RatingState::new(1400.0, 50.0, 0.06);
        let p = win_probability(&strong, &weak);
        assert!(p > 0.9);
        assert_abs_diff_eq!(p + win_probability(&weak, &strong), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_expected_rating_change_matches_update() {
        let values = ParameterValues::default();
        let a = RatingState::new(1600.0, 120.0, 0.06);
        let b = RatingState::new(1450.0, 300.0, 0.06);

        let (new_a, new_b) = update(&a, &b, 0.75, &values);
        assert_eq!(expected_rating_change(&a, &b, 0.75, &values), new_a.rating - a.rating);
        assert_eq!(expected_rating_change(&b, &a, 0.25, &values), new_b.rating - b.rating);
    }

    #[test]
    fn test_expected_rating_change_signs() {
        let values = ParameterValues::default();
        let a = defaults();
        let b = defaults();

        assert!(expected_rating_change(&a, &b, 1.0, &values) > 0.0);
        assert!(expected_rating_change(&a, &b, 0.0, &values) < 0.0);
        assert_abs_diff_eq!(expected_rating_change(&a, &b, 0.5, &values), 0.0, epsilon = 1e-9);

        // A favourite gains less from beating an underdog than it loses to one
        let favourite = RatingState::new(1800.0, 200.0, 0.06);
        let underdog = RatingState::new(1300.0, 200.0, 0.06);
        let gain = expected_rating_change(&favourite, &underdog, 1.0, &values);
        let loss = expected_rating_change(&favourite, &underdog, 0.0, &values);
        assert!(gain < -loss);
    }

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(confidence(50.0), ConfidenceLevel::VeryConfident);
        assert_eq!(confidence(100.0), ConfidenceLevel::Confident);
        assert_eq!(confidence(199.9), ConfidenceLevel::Confident);
        assert_eq!(confidence(200.0), ConfidenceLevel::ModeratelyConfident);
        assert_eq!(confidence(300.0), ConfidenceLevel::Uncertain);
        assert_eq!(confidence(350.0), ConfidenceLevel::Uncertain);
    }
}
