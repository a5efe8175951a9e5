use crate::model::error::RatingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("failed to (de)serialize column data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value} in column {column}")]
    Decode { column: &'static str, value: i64 },

    #[error("stored state is inconsistent: {0}")]
    State(#[from] RatingError)
}

impl DbError {
    pub fn decode(column: &'static str, value: i64) -> Self {
        DbError::Decode { column, value }
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;
    use crate::model::error::RatingError;

    #[test]
    fn test_decode_message() {
        assert_eq!(
            DbError::decode("outcome_level", 9).to_string(),
            "invalid value 9 in column outcome_level"
        );
    }

    #[test]
    fn test_from_rating_error() {
        let error: DbError = RatingError::ConfigurationError("no active parameter set".to_string()).into();
        assert!(matches!(error, DbError::State(_)));
    }
}
