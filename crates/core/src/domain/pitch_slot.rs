use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::pitch::{Pitch, PitchId};
use crate::domain::slot::{Slot, SlotId};

/// Reserved between the pitch id and the slot id. Pitch ids may not contain it.
pub const PITCH_SLOT_SEPARATOR: char = '-';

/// Composite key `<pitch id>-<slot id>`, shown to users for `checkout`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchSlotId(pub String);

impl PitchSlotId {
    pub fn new(pitch_id: &PitchId, slot_id: &SlotId) -> Self {
        Self(format!("{}{PITCH_SLOT_SEPARATOR}{}", pitch_id.0, slot_id.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses a single token such as `34933-123456`, ignoring the surrounding
    /// punctuation chat clients add (`<`, `>`, `*`, backticks, trailing dots).
    pub fn parse_token(token: &str) -> Option<Self> {
        let candidate = token
            .trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != PITCH_SLOT_SEPARATOR);
        let (pitch_part, slot_part) = candidate.split_once(PITCH_SLOT_SEPARATOR)?;
        let valid_part =
            |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_alphanumeric());
        if valid_part(pitch_part) && valid_part(slot_part) {
            Some(Self(candidate.to_owned()))
        } else {
            None
        }
    }

    pub fn find_in_text(text: &str) -> Option<Self> {
        text.split_whitespace().find_map(Self::parse_token)
    }
}

impl fmt::Display for PitchSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A qualifying slot held by the tracker, with its pitch for display and links.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchSlot {
    pub id: PitchSlotId,
    pub pitch: Pitch,
    pub slot: Slot,
    pub seen: bool,
}

impl PitchSlot {
    pub fn new(pitch: Pitch, slot: Slot) -> Self {
        Self { id: PitchSlotId::new(&pitch.id, &slot.id), pitch, slot, seen: false }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::pitch::PitchId;
    use crate::domain::slot::SlotId;

    use super::PitchSlotId;

    #[test]
    fn composite_id_joins_pitch_and_slot_ids() {
        let id = PitchSlotId::new(&PitchId("34933".to_owned()), &SlotId("123456".to_owned()));
        assert_eq!(id.as_str(), "34933-123456");
    }

    #[test]
    fn distinct_pairs_produce_distinct_ids() {
        let pairs = [("349", "33123"), ("3493", "3123"), ("34933", "123"), ("34933", "124")];
        let ids: Vec<_> = pairs
            .iter()
            .map(|(pitch, slot)| {
                PitchSlotId::new(&PitchId((*pitch).to_owned()), &SlotId((*slot).to_owned()))
            })
            .collect();

        for (index, id) in ids.iter().enumerate() {
            for other in &ids[index + 1..] {
                assert_ne!(id, other);
            }
        }
        assert_eq!(
            PitchSlotId::new(&PitchId("1".to_owned()), &SlotId("2".to_owned())),
            PitchSlotId::new(&PitchId("1".to_owned()), &SlotId("2".to_owned()))
        );
    }

    #[test]
    fn finds_id_inside_chat_text() {
        let found = PitchSlotId::find_in_text("<@U123> checkout *34933-123456*.");
        assert_eq!(found.map(|id| id.0).as_deref(), Some("34933-123456"));
    }

    #[test]
    fn rejects_tokens_without_both_halves() {
        assert_eq!(PitchSlotId::find_in_text("checkout 34933-"), None);
        assert_eq!(PitchSlotId::find_in_text("checkout -123456"), None);
        assert_eq!(PitchSlotId::find_in_text("checkout please"), None);
        assert_eq!(PitchSlotId::find_in_text("checkout 1-2-3"), None);
    }
}
