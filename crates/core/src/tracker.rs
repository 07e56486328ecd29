//! In-memory store of the slots that currently qualify.
//!
//! The tracker is the single source of truth for which pitch-slots are live
//! and which of them users have not been told about yet. Every operation
//! holds the lock only for map work; callers never see the lock itself.

use std::cmp::Ordering;
use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::pitch_slot::{PitchSlot, PitchSlotId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("pitch-slot id `{0}` not found in tracker")]
    NotFound(PitchSlotId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Refreshed,
}

#[derive(Debug, Default)]
pub struct SlotTracker {
    entries: RwLock<HashMap<PitchSlotId, PitchSlot>>,
}

impl SlotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `entry`. An id already tracked is stored as seen; a new id is
    /// stored as unseen regardless of the flag on the incoming entry.
    pub async fn upsert(&self, mut entry: PitchSlot) -> UpsertOutcome {
        let mut entries = self.entries.write().await;
        let already_tracked = entries.contains_key(&entry.id);
        entry.seen = already_tracked;
        entries.insert(entry.id.clone(), entry);

        if already_tracked {
            UpsertOutcome::Refreshed
        } else {
            UpsertOutcome::Inserted
        }
    }

    pub async fn remove(&self, id: &PitchSlotId) -> Option<PitchSlot> {
        let mut entries = self.entries.write().await;
        entries.remove(id)
    }

    pub async fn retrieve(&self, id: &PitchSlotId) -> Result<PitchSlot, TrackerError> {
        let entries = self.entries.read().await;
        entries.get(id).cloned().ok_or_else(|| TrackerError::NotFound(id.clone()))
    }

    /// Every tracked entry, earliest start first.
    pub async fn retrieve_all(&self) -> Vec<PitchSlot> {
        let mut all: Vec<PitchSlot> = {
            let entries = self.entries.read().await;
            entries.values().cloned().collect()
        };
        all.sort_by(by_start_then_id);
        all
    }

    pub async fn retrieve_unseen(&self) -> Vec<PitchSlot> {
        let mut unseen: Vec<PitchSlot> = {
            let entries = self.entries.read().await;
            entries.values().filter(|entry| !entry.seen).cloned().collect()
        };
        unseen.sort_by(by_start_then_id);
        unseen
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub async fn snapshot(&self) -> HashMap<PitchSlotId, PitchSlot> {
        let entries = self.entries.read().await;
        entries.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn by_start_then_id(left: &PitchSlot, right: &PitchSlot) -> Ordering {
    left.slot.starts.cmp(&right.slot.starts).then_with(|| left.id.cmp(&right.id))
}
