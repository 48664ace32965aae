//! External object model.
//!
//! Typed views over the frame payloads the dispatcher routes. Only the
//! fields the dispatch pipeline needs are modeled; everything else stays
//! reachable through the raw `extensions`/`payload` JSON.

use serde::Deserialize;
use serde_json::Value;

use amino_core::error::{AminoError, AminoResult};
use amino_socket::codes::parse_topic;

/// Message type for plain text chat messages.
pub const MESSAGE_TYPE_TEXT: i32 = 0;

/// Author of a chat message, as delivered on the socket. Socket payloads
/// carry a partial profile; the full profile lives behind the user-profile
/// endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    /// Account uid.
    #[serde(rename = "uid", default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub nickname: String,
    /// Avatar icon URL.
    #[serde(default)]
    pub icon: String,
}

#[derive(Deserialize)]
struct ChatMessageWire {
    #[serde(rename = "messageId", default)]
    message_id: String,
    #[serde(rename = "threadId", default)]
    thread_id: String,
    #[serde(default)]
    content: String,
    #[serde(rename = "type", default)]
    kind: i32,
    #[serde(default)]
    author: Author,
    #[serde(rename = "createdTime", default)]
    created_time: Option<String>,
    #[serde(default)]
    extensions: Value,
}

#[derive(Deserialize)]
struct MessageEnvelopeWire {
    #[serde(rename = "ndcId", default)]
    ndc_id: u64,
    #[serde(rename = "chatMessage")]
    chat_message: ChatMessageWire,
}

/// A chat message received on the socket.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message id.
    pub id: String,
    /// Thread the message was posted in.
    pub thread_id: String,
    /// Community the thread lives in (0 = global scope).
    pub community_id: u64,
    /// Message text.
    pub content: String,
    /// Message type; `MESSAGE_TYPE_TEXT` for plain text.
    pub kind: i32,
    /// Message author.
    pub author: Author,
    /// Creation time as unix seconds, when the payload carried one.
    pub created_time: Option<i64>,
    /// Raw extensions payload.
    pub extensions: Value,
}

impl Message {
    /// Whether this is a plain text message.
    pub fn is_text(&self) -> bool {
        self.kind == MESSAGE_TYPE_TEXT
    }
}

#[derive(Deserialize, Default)]
struct NotificationPayloadWire {
    #[serde(default)]
    id: String,
    #[serde(rename = "ndcId", default)]
    ndc_id: u64,
    #[serde(rename = "tid", default)]
    thread_id: String,
    #[serde(rename = "notifType", default)]
    notif_type: i32,
    #[serde(rename = "msgType", default)]
    msg_type: i32,
    #[serde(rename = "ts", default)]
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct NotificationWire {
    #[serde(default)]
    payload: NotificationPayloadWire,
}

/// A push notification received on the socket.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Notification id.
    pub id: String,
    /// Community the notification came from (0 = global scope).
    pub community_id: u64,
    /// Related thread, when the notification points at one.
    pub thread_id: String,
    /// Notification subtype; drives the event-name refinement.
    pub notif_type: i32,
    /// Message subtype within the notification.
    pub msg_type: i32,
    /// Timestamp as unix seconds, when the payload carried one.
    pub timestamp: Option<i64>,
    /// The raw frame payload.
    pub payload: Value,
}

/// A live-layer topic event (typing, recording, online members).
#[derive(Debug, Clone)]
pub struct LiveEvent {
    /// Community the topic lives in (0 = global scope).
    pub community_id: u64,
    /// Topic name, without the scope prefix.
    pub topic: String,
    /// The raw frame payload.
    pub payload: Value,
}

/// A dispatched event, as delivered to bound handlers.
#[derive(Debug, Clone)]
pub enum Event {
    /// Connection is ready; subscriptions have been replayed.
    Ready,
    /// A chat message.
    Message(Message),
    /// A push notification.
    Notification(Notification),
    /// A live-layer topic event.
    Live(LiveEvent),
    /// Reconnect retries were exhausted.
    Disconnected {
        /// Failed attempts before giving up.
        attempts: u32,
    },
    /// An event handler failed; delivered to `on_error`.
    HandlerError {
        /// Event name whose handler failed.
        event: String,
        /// Rendered error.
        error: String,
    },
    /// A command failed to resolve, convert, or execute; delivered to
    /// `on_command_error`.
    CommandError {
        /// Resolved command name, when resolution got that far.
        command: Option<String>,
        /// The triggering message.
        message: Message,
        /// Rendered error.
        error: String,
    },
    /// A mapped frame with no richer decoding.
    Raw {
        /// Frame code.
        code: i32,
        /// Raw payload.
        payload: Value,
    },
}

/// Decodes raw frame payloads into the external object model.
///
/// Injected into the demultiplexer so applications can substitute their
/// own decoding (extra fields, stricter validation) without touching the
/// dispatch pipeline.
pub trait PayloadFactory: Send + Sync {
    /// Decode a chat-message frame payload.
    fn message(&self, payload: &Value) -> AminoResult<Message>;
    /// Decode a notification frame payload.
    fn notification(&self, payload: &Value) -> AminoResult<Notification>;
    /// Decode a live-layer frame payload.
    fn live_event(&self, payload: &Value) -> AminoResult<LiveEvent>;
}

/// Default JSON decoder for the current wire format.
#[derive(Debug, Default)]
pub struct JsonPayloadFactory;

impl PayloadFactory for JsonPayloadFactory {
    fn message(&self, payload: &Value) -> AminoResult<Message> {
        let wire: MessageEnvelopeWire = serde_json::from_value(payload.clone())?;
        Ok(Message {
            id: wire.chat_message.message_id,
            thread_id: wire.chat_message.thread_id,
            community_id: wire.ndc_id,
            content: wire.chat_message.content,
            kind: wire.chat_message.kind,
            author: wire.chat_message.author,
            created_time: wire
                .chat_message
                .created_time
                .as_deref()
                .and_then(parse_service_timestamp),
            extensions: wire.chat_message.extensions,
        })
    }

    fn notification(&self, payload: &Value) -> AminoResult<Notification> {
        let wire: NotificationWire = serde_json::from_value(payload.clone())?;
        Ok(Notification {
            id: wire.payload.id,
            community_id: wire.payload.ndc_id,
            thread_id: wire.payload.thread_id,
            notif_type: wire.payload.notif_type,
            msg_type: wire.payload.msg_type,
            timestamp: wire
                .payload
                .timestamp
                .as_deref()
                .and_then(parse_service_timestamp),
            payload: payload.clone(),
        })
    }

    fn live_event(&self, payload: &Value) -> AminoResult<LiveEvent> {
        let raw_topic = payload
            .get("topic")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AminoError::Serialization("live event missing topic".into()))?;
        let (community_id, topic) = parse_topic(raw_topic)
            .ok_or_else(|| AminoError::Serialization(format!("malformed topic: {raw_topic}")))?;
        Ok(LiveEvent {
            community_id,
            topic,
            payload: payload.clone(),
        })
    }
}

/// Parse a service timestamp (`%Y-%m-%dT%H:%M:%SZ`) into unix seconds.
pub fn parse_service_timestamp(raw: &str) -> Option<i64> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}
