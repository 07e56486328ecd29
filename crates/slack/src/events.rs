use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::{
    blocks::MessageTemplate,
    commands::{
        CommandRequest, CommandRouter, MessageOrigin, PitchCommandService, SlashCommandPayload,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    Message(ChannelMessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    Message,
    Unsupported,
}

/// A `message` event from a channel or a direct conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelMessageEvent {
    pub channel_id: String,
    pub channel_type: Option<String>,
    pub user_id: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
    pub text: String,
    pub ts: String,
}

impl ChannelMessageEvent {
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }

    pub fn is_direct(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded { channel_id: String, message: MessageTemplate },
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Decides whether a channel message is talking to the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionDetector {
    bot_name: String,
    bot_user_mention: Option<String>,
}

impl MentionDetector {
    pub fn new(bot_name: &str, bot_user_id: Option<&str>) -> Self {
        Self {
            bot_name: bot_name.to_lowercase(),
            bot_user_mention: bot_user_id
                .filter(|id| !id.trim().is_empty())
                .map(|id| format!("<@{}>", id.trim())),
        }
    }

    /// Bot messages never count, including our own replies. Direct messages
    /// always count.
    pub fn is_addressed(&self, event: &ChannelMessageEvent) -> bool {
        if event.is_from_bot() {
            return false;
        }
        if event.is_direct() {
            return true;
        }

        event.text.to_lowercase().contains(&self.bot_name)
            || self.bot_user_mention.as_deref().is_some_and(|mention| event.text.contains(mention))
    }
}

/// Dispatcher wired to one command service for slash commands and mentions.
pub fn command_dispatcher<S>(
    service: S,
    bot_name: &str,
    bot_user_id: Option<&str>,
) -> EventDispatcher
where
    S: PitchCommandService + 'static,
{
    let router = Arc::new(CommandRouter::new(service, bot_name));
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(router.clone()));
    dispatcher.register(MessageHandler::new(router, MentionDetector::new(bot_name, bot_user_id)));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: Arc<CommandRouter<S>>,
}

impl<S> SlashCommandHandler<S>
where
    S: PitchCommandService,
{
    pub fn new(router: Arc<CommandRouter<S>>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: PitchCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if payload.channel_id.trim().is_empty() {
            return Err(EventHandlerError::InvalidPayload(format!(
                "slash command `{}` has no channel",
                payload.command
            )));
        }

        let request = CommandRequest::from_slash(payload, ctx.correlation_id.clone());
        Ok(match self.router.route(&request).await {
            Some(message) => {
                HandlerResult::Responded { channel_id: payload.channel_id.clone(), message }
            }
            None => HandlerResult::Processed,
        })
    }
}

pub struct MessageHandler<S> {
    router: Arc<CommandRouter<S>>,
    detector: MentionDetector,
}

impl<S> MessageHandler<S>
where
    S: PitchCommandService,
{
    pub fn new(router: Arc<CommandRouter<S>>, detector: MentionDetector) -> Self {
        Self { router, detector }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: PitchCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if !self.detector.is_addressed(event) {
            debug!(
                event_name = "ingress.slack.message_ignored",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                "message not addressed to the bot"
            );
            return Ok(HandlerResult::Ignored);
        }

        let request = CommandRequest {
            text: event.text.clone(),
            channel_id: event.channel_id.clone(),
            user_id: event.user_id.clone(),
            origin: MessageOrigin::User,
            request_id: ctx.correlation_id.clone(),
        };
        Ok(match self.router.route(&request).await {
            Some(message) => {
                HandlerResult::Responded { channel_id: event.channel_id.clone(), message }
            }
            None => HandlerResult::Processed,
        })
    }
}
