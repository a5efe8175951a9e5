pub mod comparison;
pub mod confidence_level;
pub mod outcome_level;
pub mod passive_event;
pub mod rating;
pub mod relationship_kind;
pub mod snapshot;

pub type ItemId = i64;
pub type ComparisonId = i64;
pub type ParameterSetId = i64;
pub type PassiveEventId = i64;
