use crate::model::structures::{ComparisonId, ItemId};
use strum_macros::Display;
use thiserror::Error;

/// The kind of record a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Entity {
    #[strum(serialize = "item")]
    Item,
    #[strum(serialize = "rating")]
    Rating,
    #[strum(serialize = "comparison")]
    Comparison,
    #[strum(serialize = "parameter set")]
    ParameterSet
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RatingError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("invalid comparison: {0}")]
    InvalidComparison(String),

    #[error("comparison {comparison_id} can no longer be undone ({elapsed_ms} ms elapsed, window is {window_ms} ms)")]
    UndoWindowExpired {
        comparison_id: ComparisonId,
        elapsed_ms: i64,
        window_ms: i64
    },

    #[error("comparison {0} has already been undone")]
    AlreadyInvalid(ComparisonId),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("invalid link: {0}")]
    InvalidLink(String),

    #[error("item {0} already exists")]
    DuplicateItem(ItemId)
}

impl RatingError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        RatingError::NotFound { entity, id }
    }

    /// Only lock contention is worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RatingError::ConcurrencyConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, RatingError>;
