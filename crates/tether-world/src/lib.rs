//! Tether World - game-session client over a WebSocket adapter
//!
//! The adapter process speaks the actual game protocol; this crate only
//! relays its JSON frames to and from the bridge.

mod client;
mod protocol;

pub use client::{WsGameClient, WsGameHandle};
pub use protocol::{classify, ClientOp, Inbound, WorldEvent};
