use chrono::{DateTime, Duration};

use crate::domain::pitch::Pitch;
use crate::domain::slot::{Slot, SlotId};

pub(crate) fn pitch(id: &str) -> Pitch {
    Pitch::new(id, format!("Pitch {id}"), format!("venue-{id}/football-5-a-side-{id}"), "london")
}

/// One-hour slot starting at `starts` (RFC 3339).
pub(crate) fn slot_at(id: &str, starts: &str, availabilities: i64) -> Slot {
    let starts = DateTime::parse_from_rfc3339(starts).expect("fixture timestamp should parse");
    Slot {
        id: SlotId(id.to_owned()),
        kind: "slots".to_owned(),
        starts,
        ends: starts + Duration::hours(1),
        availabilities,
        price: "60.00".to_owned(),
        admin_fee: "1.50".to_owned(),
        currency: "GBP".to_owned(),
    }
}
