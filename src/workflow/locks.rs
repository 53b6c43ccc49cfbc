use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Entries = HashMap<String, Arc<AsyncMutex<()>>>;

/// Serializes writes per mission: a mission and its steps form one consistency unit.
///
/// Entries exist only while someone holds or waits for a mission, so ids that were never
/// created or have been deleted do not accumulate.
#[derive(Debug, Default)]
pub struct MissionLocks {
    locks: Mutex<Entries>,
}

impl MissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the mission. Released when the guard drops.
    pub async fn acquire(&self, mission_id: &str) -> MissionGuard<'_> {
        let lock = self
            .entries()
            .entry(mission_id.to_string())
            .or_default()
            .clone();
        // Built before waiting so a cancelled acquire still cleans up its entry
        let mut guard = MissionGuard {
            locks: self,
            mission_id: mission_id.to_string(),
            lock,
            held: None,
        };
        guard.held = Some(guard.lock.clone().lock_owned().await);
        guard
    }

    /// Missions currently held or waited for
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        // The map is never left half-updated, so a poisoned lock is still usable
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to one mission
#[derive(Debug)]
pub struct MissionGuard<'a> {
    locks: &'a MissionLocks,
    mission_id: String,
    lock: Arc<AsyncMutex<()>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for MissionGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        let mut entries = self.locks.entries();
        // Clones are only taken under the map lock: the map's and ours means nobody waits
        if Arc::strong_count(&self.lock) == 2 {
            entries.remove(&self.mission_id);
        }
    }
}
