/// Glicko-2 conversion factor between the displayed scale and the internal scale
pub const GLICKO2_SCALE: f64 = 173.7178;
/// Displayed rating that maps to 0 on the internal scale
pub const GLICKO2_CENTER: f64 = 1500.0;

/// Convergence tolerance of the volatility iteration
pub const CONVERGENCE_TOLERANCE: f64 = 0.000001;
/// Hard cap on volatility iterations so the update stays total
pub const MAX_VOLATILITY_ITERATIONS: usize = 100;

// Seed parameter set
pub const DEFAULT_RATING: f64 = 1500.0;
pub const DEFAULT_DEVIATION: f64 = 350.0;
pub const DEFAULT_VOLATILITY: f64 = 0.06;
pub const DEFAULT_SYSTEM_CONSTANT: f64 = 0.5;

pub const SCORE_STRONG_A: f64 = 1.0;
pub const SCORE_SLIGHT_A: f64 = 0.75;
pub const SCORE_TIE: f64 = 0.5;
pub const SCORE_SLIGHT_B: f64 = 0.25;
pub const SCORE_STRONG_B: f64 = 0.0;

/// Bounds for the system constant (tau)
pub const MIN_SYSTEM_CONSTANT: f64 = 0.2;
pub const MAX_SYSTEM_CONSTANT: f64 = 1.5;

pub const DEFAULT_UNDO_WINDOW_SECONDS: i64 = 10;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Expected-outcome thresholds used to flag an upset
pub const UPSET_LOW_EXPECTATION: f64 = 0.4;
pub const UPSET_HIGH_EXPECTATION: f64 = 0.6;

/// Upper deviation bounds for the confidence labels, exclusive
pub const VERY_CONFIDENT_DEVIATION: f64 = 100.0;
pub const CONFIDENT_DEVIATION: f64 = 200.0;
pub const MODERATELY_CONFIDENT_DEVIATION: f64 = 300.0;
