use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::{Display, EnumIter, EnumString};

/// One of the five discrete judgments a listener can give for a pair,
/// always from item A's point of view. The numeric score comes from the
/// parameter set in force, never from the level itself.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum OutcomeLevel {
    StrongA = 0,
    SlightA = 1,
    Tie = 2,
    SlightB = 3,
    StrongB = 4
}

impl OutcomeLevel {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeLevel::StrongA => "decisive win",
            OutcomeLevel::SlightA => "slight win",
            OutcomeLevel::Tie => "draw",
            OutcomeLevel::SlightB => "slight loss",
            OutcomeLevel::StrongB => "decisive loss"
        }
    }
}

impl TryFrom<i32> for OutcomeLevel {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(OutcomeLevel::StrongA),
            1 => Ok(OutcomeLevel::SlightA),
            2 => Ok(OutcomeLevel::Tie),
            3 => Ok(OutcomeLevel::SlightB),
            4 => Ok(OutcomeLevel::StrongB),
            _ => Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::structures::outcome_level::OutcomeLevel;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_convert_codes() {
        assert_eq!(OutcomeLevel::try_from(0), Ok(OutcomeLevel::StrongA));
        assert_eq!(OutcomeLevel::try_from(2), Ok(OutcomeLevel::Tie));
        assert_eq!(OutcomeLevel::try_from(4), Ok(OutcomeLevel::StrongB));
    }

    #[test]
    fn test_convert_invalid() {
        assert_eq!(OutcomeLevel::try_from(5), Err(()));
        assert_eq!(OutcomeLevel::try_from(-1), Err(()));
    }

    #[test]
    fn test_symbols() {
        assert_eq!(OutcomeLevel::from_str("strong_a"), Ok(OutcomeLevel::StrongA));
        assert_eq!(OutcomeLevel::from_str("slight_b"), Ok(OutcomeLevel::SlightB));
        assert_eq!(OutcomeLevel::SlightA.to_string(), "slight_a");
        assert!(OutcomeLevel::from_str("0.75").is_err());
        assert!(OutcomeLevel::from_str("strong").is_err());
    }

    #[test]
    fn test_enumerate() {
        let levels = OutcomeLevel::iter().collect::<Vec<_>>();
        assert_eq!(
            levels,
            vec![
                OutcomeLevel::StrongA,
                OutcomeLevel::SlightA,
                OutcomeLevel::Tie,
                OutcomeLevel::SlightB,
                OutcomeLevel::StrongB
            ]
        );
    }

    #[test]
    fn test_serializes_as_code() {
        assert_eq!(serde_json::to_string(&OutcomeLevel::SlightB).unwrap(), "3");
        assert_eq!(serde_json::from_str::<OutcomeLevel>("1").unwrap(), OutcomeLevel::SlightA);
    }
}
