//! Per-vehicle interactive entities, created once per process.

use crate::mqtt::Button;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable set of buttons belonging to one vehicle.
pub type ButtonSet = Arc<[Button]>;

/// VIN → button set. `get_or_create` is the only mutator.
///
/// The factory runs under the lock, so it is invoked at most once per VIN
/// even if several cycles were to race for the same vehicle.
#[derive(Default)]
pub struct EntityCache {
    entries: Mutex<HashMap<String, ButtonSet>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing set for `vin`, or the one produced by `factory`.
    ///
    /// Does not announce anything; re-announcing each cycle is up to the caller.
    pub fn get_or_create<F>(&self, vin: &str, factory: F) -> ButtonSet
    where
        F: FnOnce() -> Vec<Button>,
    {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(vin) {
            return existing.clone();
        }

        let created: ButtonSet = factory().into();
        entries.insert(vin.to_string(), created.clone());
        created
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
