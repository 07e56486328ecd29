use chrono::{DateTime, FixedOffset};
use pitchwatch_core::domain::slot::{Slot, SlotId};
use serde::Deserialize;

/// Body of `GET /pitches/{id}/slots`.
#[derive(Clone, Debug, Deserialize)]
pub struct SlotsResponse {
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
    #[serde(default)]
    pub data: Vec<WireSlot>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub total_items: Option<u64>,
    #[serde(default)]
    pub filter: Option<ResponseFilter>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ResponseFilter {
    #[serde(default)]
    pub starts: Option<String>,
    #[serde(default)]
    pub ends: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WireSlot {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
    pub attributes: WireAttributes,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WireAttributes {
    pub starts: DateTime<FixedOffset>,
    pub ends: DateTime<FixedOffset>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub admin_fee: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub availabilities: i64,
}

impl From<WireSlot> for Slot {
    fn from(wire: WireSlot) -> Self {
        let WireAttributes { starts, ends, price, admin_fee, currency, availabilities } =
            wire.attributes;
        Slot {
            id: SlotId(wire.id),
            kind: wire.kind,
            starts,
            ends,
            availabilities,
            price,
            admin_fee,
            currency,
        }
    }
}

impl SlotsResponse {
    pub fn into_slots(self) -> Vec<Slot> {
        self.data.into_iter().map(Slot::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SlotsResponse;

    const BODY: &str = r#"{
        "meta": {"total_items": 2, "filter": {"starts": "2026-10-20", "ends": "2026-11-03"}},
        "data": [
            {
                "type": "slots",
                "id": "2718281",
                "attributes": {
                    "starts": "2026-10-20T19:00:00+01:00",
                    "ends": "2026-10-20T20:00:00+01:00",
                    "price": "72.00",
                    "admin_fee": "1.95",
                    "currency": "GBP",
                    "availabilities": 1
                }
            },
            {
                "type": "slots",
                "id": "2718282",
                "attributes": {
                    "starts": "2026-10-21T18:00:00+01:00",
                    "ends": "2026-10-21T19:30:00+01:00",
                    "price": "90.00",
                    "currency": "GBP",
                    "availabilities": 0
                }
            }
        ]
    }"#;

    #[test]
    fn decodes_provider_payload_into_domain_slots() {
        let response: SlotsResponse = serde_json::from_str(BODY).expect("payload should decode");
        assert_eq!(response.meta.as_ref().and_then(|meta| meta.total_items), Some(2));

        let slots = response.into_slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].id.0, "2718281");
        assert_eq!(slots[0].kind, "slots");
        assert_eq!(slots[0].availabilities, 1);
        assert_eq!(slots[0].admin_fee, "1.95");
        assert_eq!(slots[1].duration_minutes(), 90);
        assert_eq!(slots[1].admin_fee, "", "missing admin fee defaults to empty");
    }

    #[test]
    fn empty_payload_has_no_slots() {
        let response: SlotsResponse = serde_json::from_str("{}").expect("payload should decode");
        assert!(response.into_slots().is_empty());
    }

    #[test]
    fn malformed_timestamps_are_rejected() {
        let body = r#"{"data":[{"type":"slots","id":"1","attributes":{"starts":"tomorrow","ends":"later"}}]}"#;
        assert!(serde_json::from_str::<SlotsResponse>(body).is_err());
    }
}
