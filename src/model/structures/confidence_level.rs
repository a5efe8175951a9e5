use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Human-readable certainty of a rating, derived from its deviation
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryConfident,
    Confident,
    ModeratelyConfident,
    Uncertain
}
