use std::sync::Arc;

use async_trait::async_trait;
use pitchwatch_core::{
    checkout_url, ApplicationError, CycleTrigger, HeldCycle, PitchSlot, PitchSlotId, Reconciler,
};
use pitchwatch_slack::commands::{
    CheckoutLink, CommandRequest, CommandRouteError, PitchCommandService,
};
use tracing::debug;

/// Command service backed by the reconciler. Every slot query refreshes the
/// tracker first and reads it before another cycle can start, so replies
/// reflect the provider as of the request.
#[derive(Clone)]
pub struct PitchService {
    reconciler: Arc<Reconciler>,
    site_url: String,
}

impl PitchService {
    pub fn new(reconciler: Arc<Reconciler>, site_url: impl Into<String>) -> Self {
        Self { reconciler, site_url: site_url.into() }
    }

    async fn refresh(&self, request: &CommandRequest) -> HeldCycle<'_> {
        let cycle = self.reconciler.reconcile_and_hold(CycleTrigger::Command).await;
        debug!(
            event_name = "command.service.refreshed",
            correlation_id = %request.request_id,
            cycle_id = %cycle.report.cycle_id,
            tracked = cycle.report.tracked,
            "tracker refreshed for command"
        );
        cycle
    }
}

#[async_trait]
impl PitchCommandService for PitchService {
    async fn list_slots(
        &self,
        request: &CommandRequest,
    ) -> Result<Vec<PitchSlot>, CommandRouteError> {
        let cycle = self.refresh(request).await;
        Ok(cycle.tracker().retrieve_all().await)
    }

    async fn unseen_slots(
        &self,
        request: &CommandRequest,
    ) -> Result<Vec<PitchSlot>, CommandRouteError> {
        let cycle = self.refresh(request).await;
        Ok(cycle.tracker().retrieve_unseen().await)
    }

    async fn checkout_link(
        &self,
        pitch_slot_id: &PitchSlotId,
        request: &CommandRequest,
    ) -> Result<CheckoutLink, CommandRouteError> {
        let cycle = self.refresh(request).await;
        let entry = cycle
            .tracker()
            .retrieve(pitch_slot_id)
            .await
            .map_err(|error| ApplicationError::from(error).into_interface(&request.request_id))?;
        let url = checkout_url(&self.site_url, &entry.pitch, &entry.slot);
        Ok(CheckoutLink { entry, url })
    }

    fn rule_descriptions(&self) -> Vec<String> {
        self.reconciler.rules().iter().map(|rule| rule.description().to_owned()).collect()
    }

    fn pitch_names(&self) -> Vec<String> {
        self.reconciler.pitches().iter().map(|pitch| pitch.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pitchwatch_core::{FetchError, InterfaceError, PitchSlotId};
    use pitchwatch_slack::commands::{
        CommandRequest, CommandRouteError, MessageOrigin, PitchCommandService,
    };

    use super::PitchService;
    use crate::testing::{reconciler, slot_at, ScriptedSource, SITE_URL};

    fn request(text: &str) -> CommandRequest {
        CommandRequest {
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: Some("U1".to_owned()),
            origin: MessageOrigin::User,
            request_id: "req-1".to_owned(),
        }
    }

    #[tokio::test]
    async fn list_refreshes_before_reading() {
        let source = Arc::new(ScriptedSource::default());
        source.respond("34933", Ok(vec![slot_at("100001", "2026-10-20T17:00:00+01:00")])).await;
        let service = PitchService::new(reconciler(source.clone(), &["34933"]), SITE_URL);

        let slots = service.list_slots(&request("list")).await.expect("list should succeed");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, PitchSlotId("34933-100001".to_owned()));
        assert_eq!(source.calls(), 1);

        service.list_slots(&request("list")).await.expect("list should succeed");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn unseen_empties_after_a_second_query() {
        let source = Arc::new(ScriptedSource::default());
        source.respond("34933", Ok(vec![slot_at("100001", "2026-10-20T17:00:00+01:00")])).await;
        let service = PitchService::new(reconciler(source, &["34933"]), SITE_URL);

        let first = service.unseen_slots(&request("unseen")).await.expect("unseen");
        assert_eq!(first.len(), 1);

        let second = service.unseen_slots(&request("unseen")).await.expect("unseen");
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn checkout_builds_the_booking_link() {
        let source = Arc::new(ScriptedSource::default());
        source.respond("34933", Ok(vec![slot_at("100001", "2026-10-20T17:00:00+01:00")])).await;
        let service = PitchService::new(reconciler(source, &["34933"]), SITE_URL);

        let link = service
            .checkout_link(&PitchSlotId("34933-100001".to_owned()), &request("checkout"))
            .await
            .expect("checkout should resolve");

        assert_eq!(link.entry.slot.id.0, "100001");
        assert!(link.url.starts_with(SITE_URL));
        assert!(link.url.contains("venue-34933/football-5-a-side-34933"));
    }

    #[tokio::test]
    async fn checkout_of_a_vanished_slot_is_not_found() {
        let source = Arc::new(ScriptedSource::default());
        source.respond("34933", Ok(vec![slot_at("100001", "2026-10-20T17:00:00+01:00")])).await;
        let service = PitchService::new(reconciler(source.clone(), &["34933"]), SITE_URL);
        service.list_slots(&request("list")).await.expect("list");

        source.respond("34933", Ok(Vec::new())).await;
        let error = service
            .checkout_link(&PitchSlotId("34933-100001".to_owned()), &request("checkout"))
            .await
            .expect_err("slot is gone");

        match error {
            CommandRouteError::Interface(InterfaceError::NotFound { correlation_id, .. }) => {
                assert_eq!(correlation_id, "req-1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_slots_listed() {
        let source = Arc::new(ScriptedSource::default());
        source.respond("34933", Ok(vec![slot_at("100001", "2026-10-20T17:00:00+01:00")])).await;
        let service = PitchService::new(reconciler(source.clone(), &["34933"]), SITE_URL);
        service.list_slots(&request("list")).await.expect("list");

        source.respond("34933", Err(FetchError::Status { status: 502 })).await;
        let slots = service.list_slots(&request("list")).await.expect("list");
        assert_eq!(slots.len(), 1);
    }

    #[tokio::test]
    async fn names_and_rules_come_from_the_reconciler() {
        let source = Arc::new(ScriptedSource::default());
        let service = PitchService::new(reconciler(source, &["34933", "32208"]), SITE_URL);

        assert_eq!(service.pitch_names(), vec!["Pitch 34933", "Pitch 32208"]);
        assert!(service.rule_descriptions().is_empty());
    }
}
