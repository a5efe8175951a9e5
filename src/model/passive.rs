use crate::model::structures::{
    passive_event::{PassiveEvent, PassiveEventDetails},
    ItemId, PassiveEventId
};
use chrono::{DateTime, Utc};

/// Listening signals, kept apart from the comparison ledger and never read by rating code.
#[derive(Debug, Clone, Default)]
pub struct PassiveEventLog {
    events: Vec<PassiveEvent>
}

impl PassiveEventLog {
    pub fn new() -> PassiveEventLog {
        PassiveEventLog::default()
    }

    pub fn from_events(mut events: Vec<PassiveEvent>) -> PassiveEventLog {
        events.sort_by_key(|e| e.id);
        PassiveEventLog { events }
    }

    pub fn append(
        &mut self,
        item_id: ItemId,
        canonical_id: ItemId,
        details: PassiveEventDetails,
        at: DateTime<Utc>
    ) -> PassiveEvent {
        let id: PassiveEventId = self.events.last().map(|e| e.id + 1).unwrap_or(1);
        let event = PassiveEvent {
            id,
            item_id,
            canonical_id,
            details,
            recorded_at: at
        };
        self.events.push(event.clone());
        event
    }

    pub fn events_for(&self, canonical_id: ItemId) -> Vec<PassiveEvent> {
        self.events
            .iter()
            .filter(|e| e.canonical_id == canonical_id)
            .cloned()
            .collect()
    }

    pub fn events(&self) -> &[PassiveEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
