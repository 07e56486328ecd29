pub mod checkout;
pub mod config;
pub mod domain;
pub mod errors;
pub mod reconcile;
pub mod rules;
pub mod tracker;

#[cfg(test)]
mod fixtures;

pub use checkout::{checkout_url, venue_url};
pub use domain::pitch::{Pitch, PitchId};
pub use domain::pitch_slot::{PitchSlot, PitchSlotId};
pub use domain::slot::{Slot, SlotId};
pub use errors::{ApplicationError, InterfaceError};
pub use reconcile::{
    CycleReport, CycleTrigger, FetchError, HeldCycle, Reconciler, ReconcilerSettings,
    SlotSource, TimeWindow,
};
pub use rules::{Rule, RuleSpec};
pub use tracker::{SlotTracker, TrackerError};
