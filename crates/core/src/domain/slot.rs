use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub String);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bookable time window as reported by the availability provider.
///
/// Timestamps keep the provider's UTC offset so hour/weekday rules evaluate in
/// the venue's local time. Price fields are passed through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub kind: String,
    pub starts: DateTime<FixedOffset>,
    pub ends: DateTime<FixedOffset>,
    pub availabilities: i64,
    pub price: String,
    pub admin_fee: String,
    pub currency: String,
}

impl Slot {
    pub fn duration_minutes(&self) -> i64 {
        (self.ends - self.starts).num_minutes()
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes() as f64 / 60.0
    }
}
