use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::{Display, EnumIter, EnumString};

/// Informational link between two distinct recordings. None of these share a rating.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum RelationshipKind {
    Translation = 0,
    Remix = 1,
    LiveRecording = 2,
    Acoustic = 3,
    Instrumental = 4,
    Cover = 5,
    Other = 6
}

impl TryFrom<i32> for RelationshipKind {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(RelationshipKind::Translation),
            1 => Ok(RelationshipKind::Remix),
            2 => Ok(RelationshipKind::LiveRecording),
            3 => Ok(RelationshipKind::Acoustic),
            4 => Ok(RelationshipKind::Instrumental),
            5 => Ok(RelationshipKind::Cover),
            6 => Ok(RelationshipKind::Other),
            _ => Err(())
        }
    }
}
