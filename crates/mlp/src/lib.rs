//! Client for the MyLocalPitch v2 slots API.

pub mod client;
pub mod wire;

pub use client::MlpClient;
pub use wire::{SlotsResponse, WireSlot};
