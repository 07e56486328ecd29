use async_trait::async_trait;
use pitchwatch_core::domain::pitch_slot::{PitchSlot, PitchSlotId};
use pitchwatch_core::errors::InterfaceError;

use crate::commands::{CheckoutLink, CommandRequest, CommandRouteError, PitchCommandService};

/// Service with no slots; enough for exercising transport and dispatch paths.
#[derive(Default)]
pub(crate) struct EmptyPitchService;

#[async_trait]
impl PitchCommandService for EmptyPitchService {
    async fn list_slots(
        &self,
        _request: &CommandRequest,
    ) -> Result<Vec<PitchSlot>, CommandRouteError> {
        Ok(Vec::new())
    }

    async fn unseen_slots(
        &self,
        _request: &CommandRequest,
    ) -> Result<Vec<PitchSlot>, CommandRouteError> {
        Ok(Vec::new())
    }

    async fn checkout_link(
        &self,
        pitch_slot_id: &PitchSlotId,
        request: &CommandRequest,
    ) -> Result<CheckoutLink, CommandRouteError> {
        Err(CommandRouteError::Interface(InterfaceError::NotFound {
            message: pitch_slot_id.to_string(),
            correlation_id: request.request_id.clone(),
        }))
    }

    fn rule_descriptions(&self) -> Vec<String> {
        Vec::new()
    }

    fn pitch_names(&self) -> Vec<String> {
        vec!["Three Corners".to_owned()]
    }
}
