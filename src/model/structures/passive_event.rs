use super::{ItemId, PassiveEventId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum PassiveEventKind {
    Completion = 0,
    Skip = 1,
    Replay = 2
}

impl TryFrom<i32> for PassiveEventKind {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(PassiveEventKind::Completion),
            1 => Ok(PassiveEventKind::Skip),
            2 => Ok(PassiveEventKind::Replay),
            _ => Err(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassiveEventDetails {
    pub kind: PassiveEventKind,
    pub listened_ms: Option<i64>,
    pub position_ms: Option<i64>,
    pub context: Option<String>
}

impl PassiveEventDetails {
    pub fn new(kind: PassiveEventKind) -> Self {
        PassiveEventDetails {
            kind,
            listened_ms: None,
            position_ms: None,
            context: None
        }
    }
}

/// A listening signal. Kept for context only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassiveEvent {
    pub id: PassiveEventId,
    /// The reference the caller used, possibly an alias
    pub item_id: ItemId,
    pub canonical_id: ItemId,
    pub details: PassiveEventDetails,
    pub recorded_at: DateTime<Utc>
}

#[cfg(test)]
mod tests {
    use super::PassiveEventKind;

    #[test]
    fn test_convert() {
        assert_eq!(PassiveEventKind::try_from(1), Ok(PassiveEventKind::Skip));
        assert_eq!(PassiveEventKind::try_from(3), Err(()));
    }
}
