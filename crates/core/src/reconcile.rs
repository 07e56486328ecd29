//! One polling cycle: fetch every pitch, filter by rules, diff against the
//! tracker and apply the result.
//!
//! Cycles are single-flight. [`Reconciler::reconcile`] waits for a cycle that
//! is already running and then runs its own, so callers always observe data
//! fetched after they asked. [`Reconciler::try_reconcile_and_hold`] gives up
//! instead of waiting and is what the background timer uses.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::pitch::{Pitch, PitchId};
use crate::domain::pitch_slot::{PitchSlot, PitchSlotId};
use crate::domain::slot::Slot;
use crate::rules::{passes_all, Rule};
use crate::tracker::{SlotTracker, UpsertOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub starts: DateTime<Utc>,
    pub ends: DateTime<Utc>,
}

impl TimeWindow {
    pub fn ahead(now: DateTime<Utc>, days: u32) -> Self {
        Self { starts: now, ends: now + chrono::Duration::days(i64::from(days)) }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}")]
    Status { status: u16 },
    #[error("could not decode provider response: {0}")]
    Decode(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of raw slots for a pitch, normally the booking provider's API.
#[async_trait]
pub trait SlotSource: Send + Sync {
    async fn fetch_slots(&self, pitch: &Pitch, window: &TimeWindow)
        -> Result<Vec<Slot>, FetchError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Timer,
    Command,
    Manual,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub pitch_id: PitchId,
    pub error: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub inserted: usize,
    pub refreshed: usize,
    pub removed: usize,
    pub retained: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub trigger: CycleTrigger,
    pub window: TimeWindow,
    pub summary: ApplySummary,
    pub tracked: usize,
    pub failures: Vec<FetchFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub window_days: u32,
    pub fetch_timeout: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self { window_days: 14, fetch_timeout: Duration::from_secs(20) }
    }
}

/// Fresh tracker entries for the slots of `pitch` that pass every rule.
pub fn build_candidates(
    pitch: &Pitch,
    slots: Vec<Slot>,
    rules: &[Rule],
) -> HashMap<PitchSlotId, PitchSlot> {
    slots
        .into_iter()
        .filter(|slot| passes_all(slot, rules))
        .map(|slot| {
            let entry = PitchSlot::new(pitch.clone(), slot);
            (entry.id.clone(), entry)
        })
        .collect()
}

/// Diffs `candidates` against the tracker and applies the result.
///
/// Entries belonging to `stale_pitches` (pitches whose fetch failed this
/// cycle) are left exactly as they are.
pub async fn apply_candidates(
    tracker: &SlotTracker,
    mut candidates: HashMap<PitchSlotId, PitchSlot>,
    stale_pitches: &HashSet<PitchId>,
) -> ApplySummary {
    let mut summary = ApplySummary::default();
    let previous = tracker.snapshot().await;

    for (id, existing) in previous {
        if stale_pitches.contains(&existing.pitch.id) {
            summary.retained += 1;
            continue;
        }

        if candidates.remove(&id).is_some() {
            if tracker.upsert(existing).await == UpsertOutcome::Refreshed {
                summary.refreshed += 1;
            } else {
                summary.inserted += 1;
            }
        } else {
            tracker.remove(&id).await;
            summary.removed += 1;
        }
    }

    for (_, candidate) in candidates {
        match tracker.upsert(candidate).await {
            UpsertOutcome::Inserted => summary.inserted += 1,
            UpsertOutcome::Refreshed => summary.refreshed += 1,
        }
    }

    summary
}

/// A finished cycle that still holds the single-flight guard. Tracker reads
/// made through it see exactly what the cycle left behind; the next cycle
/// starts once it is dropped.
pub struct HeldCycle<'a> {
    pub report: CycleReport,
    tracker: &'a SlotTracker,
    _guard: MutexGuard<'a, ()>,
}

impl HeldCycle<'_> {
    pub fn tracker(&self) -> &SlotTracker {
        self.tracker
    }

    /// Releases the guard.
    pub fn into_report(self) -> CycleReport {
        self.report
    }
}

pub struct Reconciler {
    source: Arc<dyn SlotSource>,
    tracker: Arc<SlotTracker>,
    pitches: Vec<Pitch>,
    rules: Vec<Rule>,
    settings: ReconcilerSettings,
    in_flight: Mutex<()>,
    last_report: RwLock<Option<CycleReport>>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn SlotSource>,
        tracker: Arc<SlotTracker>,
        pitches: Vec<Pitch>,
        rules: Vec<Rule>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            source,
            tracker,
            pitches,
            rules,
            settings,
            in_flight: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    pub fn tracker(&self) -> &Arc<SlotTracker> {
        &self.tracker
    }

    pub fn pitches(&self) -> &[Pitch] {
        &self.pitches
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Runs a cycle, queueing behind any cycle already in flight.
    pub async fn reconcile(&self, trigger: CycleTrigger) -> CycleReport {
        self.reconcile_and_hold(trigger).await.report
    }

    /// Like [`Reconciler::reconcile`], but keeps other cycles out until the
    /// returned [`HeldCycle`] is dropped.
    pub async fn reconcile_and_hold(&self, trigger: CycleTrigger) -> HeldCycle<'_> {
        let guard = self.in_flight.lock().await;
        let report = self.run_cycle(trigger).await;
        HeldCycle { report, tracker: &self.tracker, _guard: guard }
    }

    /// Runs a cycle unless one is already in flight, holding the guard on
    /// success.
    pub async fn try_reconcile_and_hold(&self, trigger: CycleTrigger) -> Option<HeldCycle<'_>> {
        let Ok(guard) = self.in_flight.try_lock() else {
            debug!(
                event_name = "reconcile.cycle.skipped",
                trigger = ?trigger,
                "reconciliation already in flight; skipping"
            );
            return None;
        };
        let report = self.run_cycle(trigger).await;
        Some(HeldCycle { report, tracker: &self.tracker, _guard: guard })
    }

    async fn run_cycle(&self, trigger: CycleTrigger) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let window = TimeWindow::ahead(started_at, self.settings.window_days);

        let mut candidates = HashMap::new();
        let mut stale_pitches = HashSet::new();
        let mut failures = Vec::new();

        for pitch in &self.pitches {
            match self.fetch(pitch, &window).await {
                Ok(slots) => {
                    let fetched = slots.len();
                    let qualifying = build_candidates(pitch, slots, &self.rules);
                    debug!(
                        event_name = "reconcile.fetch.completed",
                        correlation_id = %cycle_id,
                        pitch_id = %pitch.id,
                        fetched,
                        qualifying = qualifying.len(),
                        "fetched pitch slots"
                    );
                    candidates.extend(qualifying);
                }
                Err(error) => {
                    warn!(
                        event_name = "reconcile.fetch.failed",
                        correlation_id = %cycle_id,
                        pitch_id = %pitch.id,
                        error = %error,
                        "pitch fetch failed; keeping previously tracked slots"
                    );
                    stale_pitches.insert(pitch.id.clone());
                    failures.push(FetchFailure {
                        pitch_id: pitch.id.clone(),
                        error: error.to_string(),
                    });
                }
            }
        }

        let summary = apply_candidates(&self.tracker, candidates, &stale_pitches).await;
        let report = CycleReport {
            cycle_id,
            trigger,
            window,
            summary,
            tracked: self.tracker.len().await,
            failures,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            event_name = "reconcile.cycle.completed",
            correlation_id = %cycle_id,
            trigger = ?trigger,
            inserted = summary.inserted,
            refreshed = summary.refreshed,
            removed = summary.removed,
            retained = summary.retained,
            tracked = report.tracked,
            failed_pitches = report.failures.len(),
            "reconciliation cycle completed"
        );

        *self.last_report.write().await = Some(report.clone());
        report
    }

    async fn fetch(&self, pitch: &Pitch, window: &TimeWindow) -> Result<Vec<Slot>, FetchError> {
        let timeout = self.settings.fetch_timeout;
        match tokio::time::timeout(timeout, self.source.fetch_slots(pitch, window)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }
}
