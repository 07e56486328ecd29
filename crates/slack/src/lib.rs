//! Slack interface for pitchwatch.
//!
//! - **Socket Mode** (`socket`, `transport`) - WebSocket connection to Slack (no public URL needed)
//! - **Commands** (`commands`) - `list`, `unseen`, `poll`, `checkout <id>`, `rules`, `pitches`, `help`
//! - **Events** (`events`) - slash commands and messages that mention the bot
//! - **Web API** (`web`) - `chat.postMessage` replies and Socket Mode URLs
//! - **Block Kit** (`blocks`) - message templates
//!
//! # Architecture
//!
//! ```text
//! Slack → SocketModeTransport → SocketModeRunner → EventDispatcher → CommandRouter
//!                                      ↓                                   ↓
//!                               MessageSink ← MessageTemplate ← PitchCommandService
//! ```

pub mod blocks;
pub mod commands;
pub mod events;
pub mod socket;
pub mod transport;
pub mod web;

#[cfg(test)]
mod testing;
