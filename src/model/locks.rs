use crate::model::{
    error::{RatingError, Result},
    structures::ItemId
};
use itertools::Itertools;
use std::{
    collections::HashSet,
    sync::{Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{Duration, Instant}
};
use tracing::debug;

/// Per-item exclusion.
///
/// A caller asks for every item it will touch at once; ids are sorted and
/// granted together or not at all, so two pipelines naming the same pair in
/// opposite order cannot deadlock.
#[derive(Debug)]
pub struct ItemLocks {
    held: Mutex<HashSet<ItemId>>,
    released: Condvar,
    timeout: Duration
}

/// Releases its items on drop
#[derive(Debug)]
pub struct ItemGuard<'a> {
    locks: &'a ItemLocks,
    ids: Vec<ItemId>
}

impl ItemLocks {
    pub fn new(timeout: Duration) -> ItemLocks {
        ItemLocks {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout
        }
    }

    pub fn acquire(&self, ids: &[ItemId]) -> Result<ItemGuard<'_>> {
        let ids = ids.iter().copied().sorted().dedup().collect::<Vec<_>>();
        let deadline = Instant::now() + self.timeout;

        let mut held = self.held.lock().map_err(|_| poisoned("item lock table"))?;
        while ids.iter().any(|id| held.contains(id)) {
            let now = Instant::now();
            if now >= deadline {
                return Err(RatingError::ConcurrencyConflict(format!(
                    "timed out waiting for items {:?}",
                    ids
                )));
            }

            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| poisoned("item lock table"))?;
            held = guard;
        }

        held.extend(ids.iter().copied());
        debug!(?ids, "Acquired item locks");

        Ok(ItemGuard { locks: self, ids })
    }

    pub fn is_held(&self, id: ItemId) -> bool {
        self.held.lock().map(|held| held.contains(&id)).unwrap_or(false)
    }
}

impl Drop for ItemGuard<'_> {
    fn drop(&mut self) {
        let mut held = match self.locks.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner()
        };
        for id in &self.ids {
            held.remove(id);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

fn poisoned(what: &str) -> RatingError {
    RatingError::ConcurrencyConflict(format!("{} is poisoned", what))
}

pub(crate) fn read<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| poisoned(what))
}

pub(crate) fn write<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| poisoned(what))
}

pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| poisoned(what))
}
