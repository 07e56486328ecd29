//! Live Socket Mode transport.
//!
//! Each `connect` asks the Web API for a fresh single-use WebSocket URL, so a
//! reconnect after Slack's periodic `disconnect` frame is just another
//! `connect`.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::commands::SlashCommandPayload;
use crate::events::{ChannelMessageEvent, SlackEnvelope, SlackEvent};
use crate::socket::{SocketTransport, TransportError};
use crate::web::SlackWebClient;

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a single text frame from Slack means to the runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: Option<String> },
    Envelope(SlackEnvelope),
    Ignored,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSlashCommand {
    #[serde(default)]
    command: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    trigger_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessageEvent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    channel_type: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    ts: String,
}

pub fn parse_frame(text: &str) -> Result<SocketFrame, TransportError> {
    let frame: RawFrame = serde_json::from_str(text)
        .map_err(|error| TransportError::Receive(format!("undecodable frame: {error}")))?;

    let Some(envelope_id) = frame.envelope_id else {
        return Ok(match frame.kind.as_str() {
            "hello" => SocketFrame::Hello,
            "disconnect" => SocketFrame::Disconnect { reason: frame.reason },
            _ => SocketFrame::Ignored,
        });
    };

    let payload = frame.payload.unwrap_or(Value::Null);
    let event = match frame.kind.as_str() {
        "slash_commands" => match serde_json::from_value::<RawSlashCommand>(payload) {
            Ok(raw) => SlackEvent::SlashCommand(SlashCommandPayload {
                command: raw.command,
                text: raw.text,
                channel_id: raw.channel_id,
                user_id: raw.user_id,
                trigger_id: raw.trigger_id,
            }),
            Err(error) => undecodable_payload(&envelope_id, "slash_commands", &error),
        },
        "events_api" => {
            events_api_event(&envelope_id, payload.get("event").cloned().unwrap_or(Value::Null))
        }
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id, event }))
}

/// An envelope whose payload does not decode is still acknowledged, so Slack
/// does not redeliver it on every reconnect.
fn undecodable_payload(
    envelope_id: &str,
    event_type: &str,
    error: &serde_json::Error,
) -> SlackEvent {
    debug!(
        event_name = "ingress.slack.payload_undecodable",
        correlation_id = %envelope_id,
        event_type = %event_type,
        error = %error,
        "skipping envelope with an unexpected payload shape"
    );
    SlackEvent::Unsupported { event_type: event_type.to_owned() }
}

fn events_api_event(envelope_id: &str, event: Value) -> SlackEvent {
    let event_type =
        event.get("type").and_then(Value::as_str).unwrap_or("events_api").to_owned();
    let raw: RawMessageEvent = match serde_json::from_value(event) {
        Ok(raw) => raw,
        Err(error) => return undecodable_payload(envelope_id, &event_type, &error),
    };

    // Edits, deletions and joins arrive as `message` with a subtype; only
    // plain posts and bot posts are interesting.
    let relevant_subtype = matches!(raw.subtype.as_deref(), None | Some("bot_message"));
    if raw.kind != "message" || !relevant_subtype {
        return SlackEvent::Unsupported { event_type: raw.kind };
    }

    SlackEvent::Message(ChannelMessageEvent {
        channel_id: raw.channel,
        channel_type: raw.channel_type,
        user_id: raw.user,
        bot_id: raw.bot_id,
        subtype: raw.subtype,
        text: raw.text,
        ts: raw.ts,
    })
}

pub struct SocketModeTransport {
    web: Arc<SlackWebClient>,
    stream: Mutex<Option<SocketStream>>,
}

impl SocketModeTransport {
    pub fn new(web: Arc<SlackWebClient>) -> Self {
        Self { web, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for SocketModeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .web
            .open_socket_url()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Receive("socket is not connected".to_owned()));
        };

        loop {
            let Some(message) = stream.next().await else {
                return Ok(None);
            };
            let message = message.map_err(|error| TransportError::Receive(error.to_string()))?;

            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    info!(
                        event_name = "ingress.slack.socket_closed",
                        reason = ?frame.map(|frame| frame.reason.to_string()),
                        "slack closed the socket"
                    );
                    return Ok(None);
                }
                _ => continue,
            };

            match parse_frame(&text)? {
                SocketFrame::Hello => {
                    debug!(event_name = "ingress.slack.hello", "socket mode session ready");
                }
                SocketFrame::Disconnect { reason } => {
                    info!(
                        event_name = "ingress.slack.disconnect_requested",
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "slack requested a reconnect"
                    );
                    return Ok(None);
                }
                SocketFrame::Envelope(envelope) => return Ok(Some(envelope)),
                SocketFrame::Ignored => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Acknowledge("socket is not connected".to_owned()));
        };

        let ack = json!({ "envelope_id": envelope_id }).to_string();
        stream
            .send(Message::Text(ack))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        // Slack may already have dropped the connection after `disconnect`.
        match stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(error) => Err(TransportError::Disconnect(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_frame, SocketFrame};
    use crate::events::{SlackEnvelope, SlackEvent};
    use crate::socket::TransportError;

    #[test]
    fn hello_and_disconnect_frames_are_control_frames() {
        assert_eq!(parse_frame(r#"{"type":"hello","num_connections":1}"#), Ok(SocketFrame::Hello));
        assert_eq!(
            parse_frame(r#"{"type":"disconnect","reason":"refresh_requested"}"#),
            Ok(SocketFrame::Disconnect { reason: Some("refresh_requested".to_owned()) })
        );
    }

    #[test]
    fn slash_command_frames_become_envelopes() {
        let frame = parse_frame(
            r#"{"type":"slash_commands","envelope_id":"env-7","payload":{
                "command":"/pitches","text":"checkout 34933-1","channel_id":"C1",
                "user_id":"U1","trigger_id":"t-1"}}"#,
        )
        .expect("frame should parse");

        let SocketFrame::Envelope(envelope) = frame else {
            panic!("expected an envelope");
        };
        assert_eq!(envelope.envelope_id, "env-7");
        assert!(matches!(
            envelope.event,
            SlackEvent::SlashCommand(ref payload)
                if payload.text == "checkout 34933-1" && payload.channel_id == "C1"
        ));
    }

    #[test]
    fn message_events_keep_bot_markers() {
        let frame = parse_frame(
            r#"{"type":"events_api","envelope_id":"env-8","payload":{"event":{
                "type":"message","channel":"C2","channel_type":"channel",
                "bot_id":"B1","text":"roborooney list","ts":"1.2"}}}"#,
        )
        .expect("frame should parse");

        let SocketFrame::Envelope(envelope) = frame else {
            panic!("expected an envelope");
        };
        let SlackEvent::Message(message) = envelope.event else {
            panic!("expected a message event");
        };
        assert!(message.is_from_bot());
        assert_eq!(message.channel_id, "C2");
    }

    #[test]
    fn edited_messages_and_other_envelopes_are_unsupported_but_acknowledgeable() {
        let edited = parse_frame(
            r#"{"type":"events_api","envelope_id":"env-9","payload":{"event":{
                "type":"message","subtype":"message_changed","channel":"C2"}}}"#,
        )
        .expect("frame should parse");
        assert!(matches!(
            edited,
            SocketFrame::Envelope(ref envelope)
                if matches!(envelope.event, SlackEvent::Unsupported { .. })
        ));

        let interactive =
            parse_frame(r#"{"type":"interactive","envelope_id":"env-10","payload":{}}"#)
                .expect("frame should parse");
        assert!(matches!(
            interactive,
            SocketFrame::Envelope(ref envelope)
                if matches!(
                    envelope.event,
                    SlackEvent::Unsupported { ref event_type } if event_type == "interactive"
                )
        ));
    }

    #[test]
    fn odd_payloads_still_yield_acknowledgeable_envelopes() {
        let channel_created = parse_frame(
            r#"{"type":"events_api","envelope_id":"env-11","payload":{"event":{
                "type":"channel_created","channel":{"id":"C1","name":"x"}}}}"#,
        )
        .expect("envelope with an object channel should parse");
        assert_eq!(
            channel_created,
            SocketFrame::Envelope(SlackEnvelope {
                envelope_id: "env-11".to_owned(),
                event: SlackEvent::Unsupported { event_type: "channel_created".to_owned() },
            })
        );

        let slash = parse_frame(
            r#"{"type":"slash_commands","envelope_id":"env-12","payload":{"text":42}}"#,
        )
        .expect("envelope with a bad slash payload should parse");
        assert!(matches!(
            slash,
            SocketFrame::Envelope(ref envelope)
                if envelope.envelope_id == "env-12"
                    && matches!(envelope.event, SlackEvent::Unsupported { .. })
        ));
    }

    #[test]
    fn garbage_is_a_receive_error() {
        assert!(matches!(parse_frame("not json"), Err(TransportError::Receive(_))));
    }
}
