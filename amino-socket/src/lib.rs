//! Amino Socket - persistent WebSocket client for real-time events.
//!
//! This crate owns the long-lived socket connection:
//! - Frame envelope codec (`{"t": code, "o": payload}`)
//! - The extensible code -> event-name map and live-layer topic helpers
//! - The subscription registry replayed on every (re)connect
//! - A transport seam with a tokio-tungstenite implementation
//! - The connection manager: signed handshake, heartbeat, liveness
//!   monitoring, reconnection with exponential backoff and jitter

pub mod codes;
pub mod frame;
pub mod manager;
pub mod subscriptions;
pub mod transport;

// Re-export key types
pub use codes::CodeMap;
pub use frame::{InboundFrame, OutboundFrame};
pub use manager::{
    ConnectionManager, ConnectionState, HandshakeProvider, HeartbeatConfig, ReconnectConfig,
    SocketSignal,
};
pub use subscriptions::{Subscription, SubscriptionRegistry};
pub use transport::{ConnectRequest, FrameSink, FrameSource, Transport, WsTransport};
