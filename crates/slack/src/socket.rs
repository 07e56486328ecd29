use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use pitchwatch_core::domain::pitch_slot::PitchSlotId;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent};
use crate::web::MessageSink;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Open a new session when the server closes the stream cleanly. Slack
    /// asks clients to do this every few hours.
    pub reconnect_on_close: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000, reconnect_on_close: false }
    }
}

impl ReconnectPolicy {
    /// Long-running bot settings.
    pub fn persistent() -> Self {
        Self { max_retries: 10, base_delay_ms: 500, max_delay_ms: 30_000, reconnect_on_close: true }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

enum SessionEnd {
    Closed,
    Failed { error: TransportError, was_connected: bool },
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    sink: Arc<dyn MessageSink>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        sink: Arc<dyn MessageSink>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, sink, reconnect_policy }
    }

    /// Runs sessions until retries are exhausted, or until the stream closes
    /// when reconnecting on close is disabled. Never fails the process.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0_u32;

        loop {
            match self.run_session(attempt).await {
                SessionEnd::Closed => {
                    if !self.reconnect_policy.reconnect_on_close {
                        return Ok(());
                    }
                    info!(
                        event_name = "ingress.slack.reconnect",
                        "socket mode stream closed; opening a new session"
                    );
                    attempt = 0;
                    let delay = self.reconnect_policy.backoff(0);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                SessionEnd::Failed { error, was_connected } => {
                    if was_connected {
                        attempt = 0;
                    }
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn run_session(&self, attempt: u32) -> SessionEnd {
        info!(attempt, "opening socket mode transport connection");
        if let Err(error) = self.transport.connect().await {
            return SessionEnd::Failed { error, was_connected: false };
        }
        info!(attempt, "socket mode transport connected");

        match self.pump().await {
            Ok(()) => {
                if let Err(error) = self.transport.disconnect().await {
                    warn!(error = %error, "socket mode disconnect failed after close");
                }
                SessionEnd::Closed
            }
            Err(error) => {
                if let Err(disconnect_error) = self.transport.disconnect().await {
                    debug!(error = %disconnect_error, "socket mode disconnect failed after error");
                }
                SessionEnd::Failed { error, was_connected: true }
            }
        }
    }

    async fn pump(&self) -> Result<(), TransportError> {
        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!("socket mode transport stream closed");
                return Ok(());
            };
            let (channel_id, pitch_slot_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.as_deref().unwrap_or("unknown"),
                pitch_slot_id = pitch_slot_id.as_deref().unwrap_or("none"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded { channel_id, message }) => {
                    if let Err(error) = self.sink.send_message(&channel_id, &message).await {
                        warn!(
                            event_name = "egress.slack.send_failed",
                            correlation_id = %envelope.envelope_id,
                            channel_id = %channel_id,
                            error = %error,
                            "failed to deliver reply; dropping it"
                        );
                    } else {
                        debug!(
                            event_name = "egress.slack.message_sent",
                            correlation_id = %envelope.envelope_id,
                            channel_id = %channel_id,
                            "reply delivered"
                        );
                    }
                }
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
                Err(error) => {
                    warn!(
                        event_name = "ingress.slack.dispatch_failed",
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    );
                }
            }
        }
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<String>, Option<String>) {
    match &envelope.event {
        SlackEvent::Message(event) => (
            Some(event.channel_id.clone()),
            PitchSlotId::find_in_text(&event.text).map(|id| id.0),
        ),
        SlackEvent::SlashCommand(payload) => (
            Some(payload.channel_id.clone()),
            PitchSlotId::find_in_text(&payload.text).map(|id| id.0),
        ),
        SlackEvent::Unsupported { .. } => (None, None),
    }
}
