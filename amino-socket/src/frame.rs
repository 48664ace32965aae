//! Socket frame envelope.
//!
//! Every frame on the wire is a JSON envelope `{"t": code, "o": payload}`.
//! The payload schema per code is owned by the external object model; this
//! module only knows the envelope and the handful of outbound frames the
//! connection core emits itself.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use amino_core::error::AminoResult;

use crate::codes::{self, format_topic};

#[derive(Serialize, Deserialize)]
struct WireFrame {
    t: i32,
    #[serde(default)]
    o: Value,
}

/// A frame received from the socket. Ephemeral: consumed by exactly one
/// demultiplexer pass.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// Numeric frame code.
    pub code: i32,
    /// Opaque payload; schema owned by the external object model.
    pub payload: Value,
    /// When the frame was read off the socket.
    pub received_at: Instant,
}

impl InboundFrame {
    /// Decode a wire text frame.
    pub fn decode(text: &str) -> AminoResult<Self> {
        let wire: WireFrame = serde_json::from_str(text)?;
        Ok(Self {
            code: wire.t,
            payload: wire.o,
            received_at: Instant::now(),
        })
    }
}

/// A frame to be written to the socket.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Numeric frame code.
    pub code: i32,
    /// Payload object; an `id` field is injected at encode time.
    pub payload: Value,
}

impl OutboundFrame {
    /// Build a frame with an arbitrary payload object.
    pub fn new(code: i32, payload: Value) -> Self {
        Self { code, payload }
    }

    /// Heartbeat ping frame.
    pub fn ping() -> Self {
        Self::new(
            codes::code::PING,
            serde_json::json!({ "threadChannelUserInfoList": [] }),
        )
    }

    /// Topic subscribe frame.
    pub fn subscribe(community_id: u64, topic: &str) -> Self {
        Self::new(
            codes::code::SUBSCRIBE,
            serde_json::json!({
                "topic": format_topic(community_id, topic),
                "ndcId": community_id,
            }),
        )
    }

    /// Topic unsubscribe frame.
    pub fn unsubscribe(community_id: u64, topic: &str) -> Self {
        Self::new(
            codes::code::UNSUBSCRIBE,
            serde_json::json!({
                "topic": format_topic(community_id, topic),
                "ndcId": community_id,
            }),
        )
    }

    /// Mark-as-read acknowledgement for a received chat message.
    pub fn message_ack(community_id: u64, thread_id: &str, message_id: &str) -> Self {
        Self::new(
            codes::code::MESSAGE_ACK,
            serde_json::json!({
                "ndcId": community_id,
                "threadId": thread_id,
                "messageId": message_id,
                "markHasRead": true,
            }),
        )
    }

    /// Encode to the wire envelope, injecting the frame id (seconds into
    /// the current day, per the protocol convention).
    pub fn encode(&self) -> AminoResult<String> {
        let id = (chrono::Utc::now().timestamp() % 86_400).to_string();
        let mut payload = self.payload.clone();
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id));
        }
        let wire = WireFrame {
            t: self.code,
            o: payload,
        };
        Ok(serde_json::to_string(&wire)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_inbound() {
        let frame =
            InboundFrame::decode(r#"{"t":1000,"o":{"ndcId":7,"chatMessage":{"content":"hi"}}}"#)
                .unwrap();
        assert_eq!(frame.code, 1000);
        assert_eq!(frame.payload["ndcId"], 7);
    }

    #[test]
    fn test_decode_missing_payload() {
        let frame = InboundFrame::decode(r#"{"t":117}"#).unwrap();
        assert_eq!(frame.code, 117);
        assert!(frame.payload.is_null());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(InboundFrame::decode("not json").is_err());
        assert!(InboundFrame::decode(r#"{"o":{}}"#).is_err());
    }

    #[test]
    fn test_encode_injects_id() {
        let text = OutboundFrame::ping().encode().unwrap();
        let wire: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(wire["t"], codes::code::PING);
        assert!(wire["o"]["id"].is_string());
    }

    #[test]
    fn test_subscribe_frame_topic() {
        let text = OutboundFrame::subscribe(123, "users-start-typing-at")
            .encode()
            .unwrap();
        let wire: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(wire["t"], codes::code::SUBSCRIBE);
        assert_eq!(wire["o"]["topic"], "ndtopic:x123:users-start-typing-at");
        assert_eq!(wire["o"]["ndcId"], 123);
    }

    #[test]
    fn test_message_ack_frame() {
        let text = OutboundFrame::message_ack(7, "thread-1", "msg-1")
            .encode()
            .unwrap();
        let wire: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(wire["t"], codes::code::MESSAGE_ACK);
        assert_eq!(wire["o"]["markHasRead"], true);
        assert_eq!(wire["o"]["threadId"], "thread-1");
    }
}
