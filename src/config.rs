use crate::model::constants::{DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_UNDO_WINDOW_SECONDS};
use std::time::Duration;

/// Runtime settings of the comparison engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long after creation a comparison can still be undone, inclusive
    pub undo_window: chrono::Duration,
    /// Longest wait for a contended item before giving up
    pub lock_timeout: Duration
}

impl EngineConfig {
    pub fn new(undo_window: chrono::Duration, lock_timeout: Duration) -> Self {
        Self {
            undo_window,
            lock_timeout
        }
    }

    pub fn with_undo_window(mut self, undo_window: chrono::Duration) -> Self {
        self.undo_window = undo_window;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_window: chrono::Duration::seconds(DEFAULT_UNDO_WINDOW_SECONDS),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS)
        }
    }
}
