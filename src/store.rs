//! In-memory snapshot store, current and previous snapshot per race.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::types::{RaceKey, RaceSnapshot};

#[derive(Debug, Clone)]
struct Slot {
    current: RaceSnapshot,
    previous: Option<RaceSnapshot>,
}

/// Snapshots held for the lifetime of one process
#[derive(Debug, Default)]
pub struct SnapshotStore {
    races: BTreeMap<RaceKey, Slot>,
}

impl SnapshotStore {
    pub fn init() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RaceKey) -> Option<&RaceSnapshot> {
        self.races.get(key).map(|slot| &slot.current)
    }

    /// Snapshot displaced by the latest `put`
    pub fn previous(&self, key: &RaceKey) -> Option<&RaceSnapshot> {
        self.races.get(key).and_then(|slot| slot.previous.as_ref())
    }

    /// Store a snapshot; the one it replaces becomes `previous` and is returned
    pub fn put(&mut self, snapshot: RaceSnapshot) -> Option<RaceSnapshot> {
        let key = snapshot.key;
        match self.races.get_mut(&key) {
            Some(slot) => {
                let displaced = std::mem::replace(&mut slot.current, snapshot);
                slot.previous = Some(displaced.clone());
                Some(displaced)
            }
            None => {
                self.races.insert(
                    key,
                    Slot {
                        current: snapshot,
                        previous: None,
                    },
                );
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.races.clear();
    }

    /// Current snapshots of one meeting day, by race number
    pub fn snapshots_on(&self, date: NaiveDate) -> Vec<&RaceSnapshot> {
        self.races
            .range(RaceKey::new(date, 0)..=RaceKey::new(date, u8::MAX))
            .map(|(_, slot)| &slot.current)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.races.len()
    }

    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }
}
