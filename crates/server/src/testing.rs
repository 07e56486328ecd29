use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration};
use pitchwatch_core::{
    FetchError, Pitch, Reconciler, ReconcilerSettings, Slot, SlotId, SlotSource, SlotTracker,
    TimeWindow,
};
use pitchwatch_slack::blocks::MessageTemplate;
use pitchwatch_slack::web::{MessageSink, SendError};
use tokio::sync::Mutex;

pub(crate) const SITE_URL: &str = "https://www.mylocalpitch.com";

pub(crate) fn pitch(id: &str) -> Pitch {
    Pitch::new(id, format!("Pitch {id}"), format!("venue-{id}/football-5-a-side-{id}"), "london")
}

pub(crate) fn slot_at(id: &str, starts: &str) -> Slot {
    let starts = DateTime::parse_from_rfc3339(starts).expect("fixture timestamp should parse");
    Slot {
        id: SlotId(id.to_owned()),
        kind: "slots".to_owned(),
        starts,
        ends: starts + Duration::hours(1),
        availabilities: 1,
        price: "60.00".to_owned(),
        admin_fee: "1.50".to_owned(),
        currency: "GBP".to_owned(),
    }
}

/// Provider double answering each pitch from a scripted table.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    responses: Mutex<HashMap<String, Result<Vec<Slot>, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) async fn respond(&self, pitch_id: &str, response: Result<Vec<Slot>, FetchError>) {
        self.responses.lock().await.insert(pitch_id.to_owned(), response);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlotSource for ScriptedSource {
    async fn fetch_slots(
        &self,
        pitch: &Pitch,
        _window: &TimeWindow,
    ) -> Result<Vec<Slot>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses.lock().await.get(&pitch.id.0).cloned().unwrap_or(Ok(Vec::new()))
    }
}

pub(crate) fn reconciler(source: Arc<ScriptedSource>, pitch_ids: &[&str]) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(
        source,
        Arc::new(SlotTracker::new()),
        pitch_ids.iter().map(|id| pitch(id)).collect(),
        Vec::new(),
        ReconcilerSettings::default(),
    ))
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) sent: Mutex<Vec<(String, MessageTemplate)>>,
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SendError> {
        self.sent.lock().await.push((channel_id.to_owned(), message.clone()));
        Ok(())
    }
}
