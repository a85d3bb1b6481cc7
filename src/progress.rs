//! Weekly, per-workout progress snapshots on top of a [`KvStore`].
//!
//! A snapshot is keyed by workout id and ISO week, so every new week starts
//! from scratch. Persistence is best-effort: failures are logged and the
//! caller carries on as if nothing was saved.

use std::collections::BTreeSet;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::store::{KvStore, StoreError};
use crate::week::{iso_week_label, is_week_label};

pub const KEY_PREFIX: &str = "workout_progress_";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("malformed progress record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Where a user left off in one workout during one ISO week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub workout_id: String,
    pub exercise_index: usize,
    pub current_set: u32,
    pub completed_sets: BTreeSet<u32>,
    pub week: String,
    pub completed: bool,
    pub last_updated: DateTime<Local>,
}

pub fn progress_key(workout_id: &str, week: &str) -> String {
    format!("{KEY_PREFIX}{workout_id}_{week}")
}

#[derive(Debug, Clone)]
pub struct ProgressStore<S: KvStore, C: Clock> {
    store: S,
    clock: C,
}

impl<S: KvStore, C: Clock> ProgressStore<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn current_week(&self) -> String {
        iso_week_label(self.clock.now().date_naive())
    }

    /// Best-effort write; failures are logged and dropped
    pub fn save(&mut self, snapshot: &ProgressSnapshot) {
        if let Err(e) = self.try_save(snapshot) {
            warn!(workout = %snapshot.workout_id, error = %e, "failed to save progress");
        }
    }

    pub fn try_save(&mut self, snapshot: &ProgressSnapshot) -> Result<(), PersistenceError> {
        let key = progress_key(&snapshot.workout_id, &self.current_week());
        let value = serde_json::to_string(snapshot)?;
        self.store.set(&key, &value)?;
        debug!(%key, exercise = snapshot.exercise_index, set = snapshot.current_set, "progress saved");
        Ok(())
    }

    /// This week's snapshot, or `None` if missing, unreadable, or stale
    pub fn load(&self, workout_id: &str) -> Option<ProgressSnapshot> {
        match self.try_load(workout_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(workout = %workout_id, error = %e, "ignoring unreadable progress");
                None
            }
        }
    }

    pub fn try_load(&self, workout_id: &str) -> Result<Option<ProgressSnapshot>, PersistenceError> {
        let week = self.current_week();
        let key = progress_key(workout_id, &week);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let snapshot: ProgressSnapshot = serde_json::from_str(&raw)?;
        if snapshot.week != week || snapshot.workout_id != workout_id {
            debug!(%key, stored_week = %snapshot.week, "discarding stale progress");
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    /// Drop the workout's snapshots for every week
    pub fn clear(&mut self, workout_id: &str) {
        if let Err(e) = self.try_clear(workout_id) {
            warn!(workout = %workout_id, error = %e, "failed to clear progress");
        }
    }

    pub fn try_clear(&mut self, workout_id: &str) -> Result<usize, PersistenceError> {
        let prefix = format!("{KEY_PREFIX}{workout_id}_");
        // the remainder must be exactly a week label, otherwise the key
        // belongs to another workout whose id starts with this one
        let doomed: Vec<String> = self
            .store
            .keys()?
            .into_iter()
            .filter(|k| k.strip_prefix(&prefix).is_some_and(is_week_label))
            .collect();
        for key in &doomed {
            self.store.remove(key)?;
        }
        debug!(workout = %workout_id, removed = doomed.len(), "progress cleared");
        Ok(doomed.len())
    }
}
