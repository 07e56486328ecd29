use async_trait::async_trait;
use pitchwatch_core::domain::pitch_slot::{PitchSlot, PitchSlotId};
use pitchwatch_core::errors::InterfaceError;
use thiserror::Error;
use tracing::warn;

use crate::blocks::{self, MessageTemplate};

/// Who asked. Timer-driven requests stay silent when there is nothing new.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOrigin {
    User,
    Ticker,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
}

/// A command addressed to the bot, independent of how it arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRequest {
    pub text: String,
    pub channel_id: String,
    pub user_id: Option<String>,
    pub origin: MessageOrigin,
    pub request_id: String,
}

impl CommandRequest {
    pub fn from_slash(payload: &SlashCommandPayload, request_id: impl Into<String>) -> Self {
        Self {
            text: payload.text.clone(),
            channel_id: payload.channel_id.clone(),
            user_id: Some(payload.user_id.clone()),
            origin: MessageOrigin::User,
            request_id: request_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PitchCommand {
    Checkout { pitch_slot_id: Option<PitchSlotId> },
    Poll,
    Unseen,
    Rules,
    Pitches,
    List,
    Help,
}

/// Case-insensitive substring match against the raw text. Earlier keywords
/// win: `help` beats everything, then `checkout`, and `list unseen` is an
/// unseen request.
pub fn parse_pitch_command(text: &str) -> PitchCommand {
    let lowered = text.to_lowercase();
    let has = |keyword: &str| lowered.contains(keyword);

    if has("help") {
        PitchCommand::Help
    } else if has("checkout") {
        PitchCommand::Checkout { pitch_slot_id: PitchSlotId::find_in_text(text) }
    } else if has("poll") {
        PitchCommand::Poll
    } else if has("unseen") {
        PitchCommand::Unseen
    } else if has("rules") {
        PitchCommand::Rules
    } else if has("pitches") || has("resources") {
        PitchCommand::Pitches
    } else if has("list") {
        PitchCommand::List
    } else {
        PitchCommand::Help
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutLink {
    pub entry: PitchSlot,
    pub url: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Interface(#[from] InterfaceError),
    #[error("command service failed: {0}")]
    Service(String),
}

/// Data behind the chat commands. Slot queries refresh the tracker before
/// reading it.
#[async_trait]
pub trait PitchCommandService: Send + Sync {
    async fn list_slots(&self, request: &CommandRequest)
        -> Result<Vec<PitchSlot>, CommandRouteError>;

    async fn unseen_slots(
        &self,
        request: &CommandRequest,
    ) -> Result<Vec<PitchSlot>, CommandRouteError>;

    async fn checkout_link(
        &self,
        pitch_slot_id: &PitchSlotId,
        request: &CommandRequest,
    ) -> Result<CheckoutLink, CommandRouteError>;

    fn rule_descriptions(&self) -> Vec<String>;

    fn pitch_names(&self) -> Vec<String>;
}

pub struct CommandRouter<S> {
    service: S,
    bot_name: String,
}

impl<S> CommandRouter<S>
where
    S: PitchCommandService,
{
    pub fn new(service: S, bot_name: impl Into<String>) -> Self {
        Self { service, bot_name: bot_name.into() }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Always produces a reply for user requests; failures are rendered as
    /// messages rather than returned.
    pub async fn route(&self, request: &CommandRequest) -> Option<MessageTemplate> {
        match self.dispatch(request).await {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    event_name = "command.route.failed",
                    correlation_id = %request.request_id,
                    channel_id = %request.channel_id,
                    error = %error,
                    "command failed"
                );
                match request.origin {
                    MessageOrigin::User => Some(render_route_error(&error, &request.request_id)),
                    MessageOrigin::Ticker => None,
                }
            }
        }
    }

    async fn dispatch(
        &self,
        request: &CommandRequest,
    ) -> Result<Option<MessageTemplate>, CommandRouteError> {
        let message = match parse_pitch_command(&request.text) {
            PitchCommand::Checkout { pitch_slot_id: None } => {
                blocks::missing_pitch_slot_id_message()
            }
            PitchCommand::Checkout { pitch_slot_id: Some(id) } => {
                let link = self.service.checkout_link(&id, request).await?;
                blocks::checkout_message(&link.entry, &link.url)
            }
            PitchCommand::Poll => blocks::poll_message(&self.service.list_slots(request).await?),
            PitchCommand::Unseen => {
                let unseen = self.service.unseen_slots(request).await?;
                return Ok(blocks::unseen_slots_message(&unseen, request.origin));
            }
            PitchCommand::Rules => blocks::rules_message(&self.service.rule_descriptions()),
            PitchCommand::Pitches => blocks::pitches_message(&self.service.pitch_names()),
            PitchCommand::List => {
                blocks::slot_list_message(&self.service.list_slots(request).await?)
            }
            PitchCommand::Help => blocks::help_message(&self.bot_name),
        };
        Ok(Some(message))
    }
}

fn render_route_error(error: &CommandRouteError, request_id: &str) -> MessageTemplate {
    match error {
        CommandRouteError::Interface(interface @ InterfaceError::NotFound { .. }) => {
            blocks::plain_message(interface.user_message())
        }
        CommandRouteError::Interface(interface) => {
            blocks::error_message(interface.user_message(), interface.correlation_id())
        }
        CommandRouteError::Service(_) => {
            blocks::error_message("Something went wrong handling that command.", request_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use pitchwatch_core::domain::pitch::Pitch;
    use pitchwatch_core::domain::pitch_slot::{PitchSlot, PitchSlotId};
    use pitchwatch_core::domain::slot::{Slot, SlotId};
    use pitchwatch_core::errors::InterfaceError;

    use super::{
        parse_pitch_command, CheckoutLink, CommandRequest, CommandRouteError, CommandRouter,
        MessageOrigin, PitchCommand, PitchCommandService,
    };
    use crate::blocks::{MISSING_PITCH_SLOT_ID_TEXT, NO_NEW_SLOTS_TEXT};

    fn entry(slot_id: &str) -> PitchSlot {
        let starts = DateTime::parse_from_rfc3339("2026-10-20T19:00:00+01:00").expect("timestamp");
        PitchSlot::new(
            Pitch::new("34933", "Three Corners", "three-corners/football-5-a-side-34933", "london"),
            Slot {
                id: SlotId(slot_id.to_owned()),
                kind: "slots".to_owned(),
                starts,
                ends: starts + Duration::hours(1),
                availabilities: 1,
                price: "60.00".to_owned(),
                admin_fee: "1.50".to_owned(),
                currency: "GBP".to_owned(),
            },
        )
    }

    #[derive(Default)]
    struct FakeService {
        slots: Vec<PitchSlot>,
        unseen: Vec<PitchSlot>,
        fail_with: Option<CommandRouteError>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeService {
        fn record(&self, call: &'static str) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }

        fn failure(&self) -> Result<(), CommandRouteError> {
            match &self.fail_with {
                Some(CommandRouteError::Service(message)) => {
                    Err(CommandRouteError::Service(message.clone()))
                }
                Some(CommandRouteError::Interface(error)) => {
                    Err(CommandRouteError::Interface(error.clone()))
                }
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl PitchCommandService for FakeService {
        async fn list_slots(
            &self,
            _request: &CommandRequest,
        ) -> Result<Vec<PitchSlot>, CommandRouteError> {
            self.record("list");
            self.failure()?;
            Ok(self.slots.clone())
        }

        async fn unseen_slots(
            &self,
            _request: &CommandRequest,
        ) -> Result<Vec<PitchSlot>, CommandRouteError> {
            self.record("unseen");
            self.failure()?;
            Ok(self.unseen.clone())
        }

        async fn checkout_link(
            &self,
            pitch_slot_id: &PitchSlotId,
            request: &CommandRequest,
        ) -> Result<CheckoutLink, CommandRouteError> {
            self.record("checkout");
            self.slots
                .iter()
                .find(|entry| &entry.id == pitch_slot_id)
                .map(|entry| CheckoutLink {
                    entry: entry.clone(),
                    url: format!("https://book.test/checkout/{}", entry.slot.id.0),
                })
                .ok_or_else(|| {
                    CommandRouteError::Interface(InterfaceError::NotFound {
                        message: pitch_slot_id.to_string(),
                        correlation_id: request.request_id.clone(),
                    })
                })
        }

        fn rule_descriptions(&self) -> Vec<String> {
            vec!["Only weekdays".to_owned()]
        }

        fn pitch_names(&self) -> Vec<String> {
            vec!["Three Corners".to_owned()]
        }
    }

    fn request(text: &str, origin: MessageOrigin) -> CommandRequest {
        CommandRequest {
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: Some("U1".to_owned()),
            origin,
            request_id: "req-1".to_owned(),
        }
    }

    #[test]
    fn parses_commands_by_case_insensitive_substring() {
        assert_eq!(parse_pitch_command("@roborooney LIST please"), PitchCommand::List);
        assert_eq!(parse_pitch_command("any unseen slots?"), PitchCommand::Unseen);
        assert_eq!(parse_pitch_command("list unseen"), PitchCommand::Unseen);
        assert_eq!(parse_pitch_command("what are the Rules"), PitchCommand::Rules);
        assert_eq!(parse_pitch_command("pitches"), PitchCommand::Pitches);
        assert_eq!(parse_pitch_command("show resources"), PitchCommand::Pitches);
        assert_eq!(parse_pitch_command("make a poll"), PitchCommand::Poll);
        assert_eq!(parse_pitch_command("help"), PitchCommand::Help);
        assert_eq!(parse_pitch_command("hello there"), PitchCommand::Help);
        assert_eq!(
            parse_pitch_command("checkout *34933-2718281*"),
            PitchCommand::Checkout {
                pitch_slot_id: Some(PitchSlotId("34933-2718281".to_owned()))
            }
        );
        assert_eq!(
            parse_pitch_command("checkout the list"),
            PitchCommand::Checkout { pitch_slot_id: None }
        );
    }

    #[test]
    fn help_wins_over_every_other_keyword() {
        assert_eq!(parse_pitch_command("help checkout"), PitchCommand::Help);
        assert_eq!(parse_pitch_command("HELP with the list"), PitchCommand::Help);
        assert_eq!(parse_pitch_command("poll help"), PitchCommand::Help);
    }

    #[tokio::test]
    async fn list_queries_the_service_once() {
        let service = FakeService { slots: vec![entry("1")], ..FakeService::default() };
        let router = CommandRouter::new(service, "roborooney");

        let message =
            router.route(&request("list", MessageOrigin::User)).await.expect("list replies");
        assert!(message.fallback_text.contains("34933-1"));
        assert_eq!(router.service.calls(), vec!["list"]);
    }

    #[tokio::test]
    async fn unseen_from_ticker_is_silent_when_empty() {
        let router = CommandRouter::new(FakeService::default(), "roborooney");

        assert!(router.route(&request("unseen", MessageOrigin::Ticker)).await.is_none());
        let reply = router
            .route(&request("unseen", MessageOrigin::User))
            .await
            .expect("user request replies");
        assert_eq!(reply.fallback_text, NO_NEW_SLOTS_TEXT);
    }

    #[tokio::test]
    async fn checkout_with_unknown_id_replies_not_found() {
        let service = FakeService { slots: vec![entry("1")], ..FakeService::default() };
        let router = CommandRouter::new(service, "roborooney");

        let reply = router
            .route(&request("checkout 34933-999", MessageOrigin::User))
            .await
            .expect("checkout replies");
        assert_eq!(
            reply.fallback_text,
            "Pitch-Slot ID not found. Try listing all available bookings again"
        );

        let found = router
            .route(&request("checkout 34933-1", MessageOrigin::User))
            .await
            .expect("checkout replies");
        assert_eq!(found.fallback_text, "https://book.test/checkout/1");
    }

    #[tokio::test]
    async fn checkout_without_id_explains_the_format_without_querying() {
        let router = CommandRouter::new(FakeService::default(), "roborooney");

        let reply = router
            .route(&request("checkout please", MessageOrigin::User))
            .await
            .expect("checkout replies");
        assert_eq!(reply.fallback_text, MISSING_PITCH_SLOT_ID_TEXT);
        assert!(router.service.calls().is_empty());
    }

    #[tokio::test]
    async fn static_commands_do_not_touch_slot_data() {
        let router = CommandRouter::new(FakeService::default(), "roborooney");

        let rules = router.route(&request("rules", MessageOrigin::User)).await.expect("reply");
        assert_eq!(rules.fallback_text, "-Only weekdays\n");
        let pitches = router.route(&request("pitches", MessageOrigin::User)).await.expect("reply");
        assert_eq!(pitches.fallback_text, "-Three Corners\n");
        let help = router.route(&request("hi", MessageOrigin::User)).await.expect("reply");
        assert!(help.fallback_text.contains("roborooney checkout"));
        assert!(router.service.calls().is_empty());
    }

    #[tokio::test]
    async fn service_failures_become_error_messages() {
        let service = FakeService {
            fail_with: Some(CommandRouteError::Service("boom".to_owned())),
            ..FakeService::default()
        };
        let router = CommandRouter::new(service, "roborooney");

        let reply = router.route(&request("list", MessageOrigin::User)).await.expect("reply");
        assert!(reply.fallback_text.contains("Something went wrong"));
        assert!(!reply.fallback_text.contains("boom"), "internal detail stays in the logs");
    }
}
