use super::{comparison::Comparison, passive_event::PassiveEvent, rating::Rating};
use crate::model::{
    identity::{Item, ItemRelationship},
    parameters::ParameterSet
};
use serde::{Deserialize, Serialize};

/// The complete engine state, as exchanged with storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub parameter_sets: Vec<ParameterSet>,
    pub items: Vec<Item>,
    pub relationships: Vec<ItemRelationship>,
    pub ratings: Vec<Rating>,
    pub comparisons: Vec<Comparison>,
    pub passive_events: Vec<PassiveEvent>
}

impl EngineSnapshot {
    pub fn is_empty(&self) -> bool {
        self.parameter_sets.is_empty() && self.items.is_empty()
    }
}
