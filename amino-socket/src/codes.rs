//! Socket code and event-name tables.
//!
//! The numeric frame codes are owned by the external protocol and the set
//! of notifications it delivers is still evolving, so the code -> event
//! mapping is an extensible table seeded with the stable defaults rather
//! than a closed enum. The same applies to the live-layer topic names and
//! the notification subtypes that refine an event name.

use std::collections::HashMap;

/// Stable frame codes owned by the external protocol.
pub mod code {
    /// Inbound chat message.
    pub const MESSAGE: i32 = 1000;
    /// Outbound mark-as-read acknowledgement.
    pub const MESSAGE_ACK: i32 = 100;
    /// Inbound notification (follows, comments, voice-chat invites, ...).
    pub const NOTIFICATION: i32 = 10;
    /// Inbound live-layer topic event (typing, recording, online members).
    pub const LIVE_LAYER_EVENT: i32 = 400;
    /// Outbound live-layer topic subscribe request.
    pub const SUBSCRIBE: i32 = 300;
    /// Outbound live-layer topic unsubscribe request.
    pub const UNSUBSCRIBE: i32 = 303;
    /// Outbound heartbeat ping.
    pub const PING: i32 = 116;
    /// Inbound heartbeat acknowledgement.
    pub const PONG: i32 = 117;
}

/// Synthetic event names not backed by a frame code.
pub mod event {
    /// Connection established and subscriptions replayed.
    pub const READY: &str = "on_ready";
    /// An event handler failed.
    pub const ERROR: &str = "on_error";
    /// A command failed to parse, convert, or execute.
    pub const COMMAND_ERROR: &str = "on_command_error";
    /// Reconnect retries were exhausted.
    pub const DISCONNECT: &str = "on_disconnect";
}

/// Notification subtypes carried in a notification frame's `notifType`.
pub mod notif_type {
    pub const MESSAGE: i32 = 18;
    pub const FOLLOW: i32 = 13;
    pub const COMMENT: i32 = 36;
    pub const VC_START: i32 = 30;
    pub const VC_INVITE: i32 = 31;
}

/// Extensible mapping from protocol identifiers to canonical event names.
///
/// Seeded with the stable defaults; applications may register additional
/// codes, topics, or notification types before the client runs.
#[derive(Debug, Clone)]
pub struct CodeMap {
    events: HashMap<i32, String>,
    topics: HashMap<String, String>,
    notif_types: HashMap<i32, String>,
}

impl Default for CodeMap {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CodeMap {
    /// An empty map with no known codes.
    pub fn empty() -> Self {
        Self {
            events: HashMap::new(),
            topics: HashMap::new(),
            notif_types: HashMap::new(),
        }
    }

    /// The default table for the current protocol.
    pub fn with_defaults() -> Self {
        let mut map = Self::empty();
        map.insert_code(code::MESSAGE, "on_message");
        map.insert_code(code::NOTIFICATION, "on_notification");
        map.insert_code(code::LIVE_LAYER_EVENT, "on_livelayer");
        map.insert_code(code::PONG, "on_pong");

        map.insert_topic("users-start-typing-at", "on_start_typing");
        map.insert_topic("users-end-typing-at", "on_end_typing");
        map.insert_topic("users-start-recording-at", "on_start_recording");
        map.insert_topic("users-end-recording-at", "on_end_recording");
        map.insert_topic("online-members", "on_online_members");

        map.insert_notif_type(notif_type::MESSAGE, "on_notification");
        map.insert_notif_type(notif_type::FOLLOW, "on_follow");
        map.insert_notif_type(notif_type::COMMENT, "on_comment");
        map.insert_notif_type(notif_type::VC_START, "on_vc_start");
        map.insert_notif_type(notif_type::VC_INVITE, "on_vc_invite");
        map
    }

    /// Register a frame code -> event name mapping.
    pub fn insert_code(&mut self, code: i32, event: &str) {
        self.events.insert(code, event.to_string());
    }

    /// Register a live-layer topic -> event name mapping.
    pub fn insert_topic(&mut self, topic: &str, event: &str) {
        self.topics.insert(topic.to_string(), event.to_string());
    }

    /// Register a notification subtype -> event name mapping.
    pub fn insert_notif_type(&mut self, notif_type: i32, event: &str) {
        self.notif_types.insert(notif_type, event.to_string());
    }

    /// Canonical event name for a frame code.
    pub fn event_for_code(&self, code: i32) -> Option<&str> {
        self.events.get(&code).map(String::as_str)
    }

    /// Refined event name for a live-layer topic, defaulting to the
    /// generic live-layer event.
    pub fn event_for_topic(&self, topic: &str) -> &str {
        self.topics
            .get(topic)
            .map(String::as_str)
            .unwrap_or("on_livelayer")
    }

    /// Refined event name for a notification subtype, defaulting to the
    /// generic notification event.
    pub fn event_for_notif_type(&self, notif_type: i32) -> &str {
        self.notif_types
            .get(&notif_type)
            .map(String::as_str)
            .unwrap_or("on_notification")
    }

    /// Whether `name` is a valid event name to bind a handler to: any
    /// mapped code/topic/notification event, or a synthetic name.
    pub fn is_valid_event(&self, name: &str) -> bool {
        matches!(
            name,
            event::READY | event::ERROR | event::COMMAND_ERROR | event::DISCONNECT
        ) || self.events.values().any(|v| v == name)
            || self.topics.values().any(|v| v == name)
            || self.notif_types.values().any(|v| v == name)
            || name == "on_livelayer"
            || name == "on_notification"
    }
}

/// Format a live-layer topic string: `ndtopic:x{community}:{topic}` within
/// a community, `ndtopic:g:{topic}` in the global scope.
pub fn format_topic(community_id: u64, topic: &str) -> String {
    if community_id == 0 {
        format!("ndtopic:g:{topic}")
    } else {
        format!("ndtopic:x{community_id}:{topic}")
    }
}

/// Parse a live-layer topic string into (community id, topic name).
/// The global scope parses as community id 0.
pub fn parse_topic(raw: &str) -> Option<(u64, String)> {
    let rest = raw.strip_prefix("ndtopic:")?;
    let (scope, topic) = rest.split_once(':')?;
    if topic.is_empty() {
        return None;
    }
    if scope == "g" {
        return Some((0, topic.to_string()));
    }
    let id = scope.strip_prefix('x')?.parse().ok()?;
    Some((id, topic.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_code_mapping() {
        let map = CodeMap::with_defaults();
        assert_eq!(map.event_for_code(code::MESSAGE), Some("on_message"));
        assert_eq!(
            map.event_for_code(code::NOTIFICATION),
            Some("on_notification")
        );
        assert_eq!(map.event_for_code(9999), None);
    }

    #[test]
    fn test_extensible_codes() {
        let mut map = CodeMap::with_defaults();
        assert_eq!(map.event_for_code(500), None);
        map.insert_code(500, "on_channel_update");
        assert_eq!(map.event_for_code(500), Some("on_channel_update"));
        assert!(map.is_valid_event("on_channel_update"));
    }

    #[test]
    fn test_topic_refinement() {
        let map = CodeMap::with_defaults();
        assert_eq!(
            map.event_for_topic("users-start-typing-at"),
            "on_start_typing"
        );
        assert_eq!(map.event_for_topic("something-new"), "on_livelayer");
    }

    #[test]
    fn test_notif_type_refinement() {
        let map = CodeMap::with_defaults();
        assert_eq!(map.event_for_notif_type(notif_type::FOLLOW), "on_follow");
        assert_eq!(map.event_for_notif_type(-5), "on_notification");
    }

    #[test]
    fn test_valid_event_names() {
        let map = CodeMap::with_defaults();
        assert!(map.is_valid_event("on_message"));
        assert!(map.is_valid_event("on_ready"));
        assert!(map.is_valid_event("on_command_error"));
        assert!(map.is_valid_event("on_start_typing"));
        assert!(map.is_valid_event("on_follow"));
        assert!(!map.is_valid_event("on_totally_made_up"));
    }

    #[test]
    fn test_format_topic() {
        assert_eq!(format_topic(0, "online-members"), "ndtopic:g:online-members");
        assert_eq!(
            format_topic(42, "users-end-typing-at"),
            "ndtopic:x42:users-end-typing-at"
        );
    }

    #[test]
    fn test_parse_topic() {
        assert_eq!(
            parse_topic("ndtopic:x42:users-end-typing-at"),
            Some((42, "users-end-typing-at".to_string()))
        );
        assert_eq!(
            parse_topic("ndtopic:g:online-members"),
            Some((0, "online-members".to_string()))
        );
        assert_eq!(parse_topic("ndtopic:x42:"), None);
        assert_eq!(parse_topic("ndtopic:zzz:topic"), None);
        assert_eq!(parse_topic("garbage"), None);
    }

    #[test]
    fn test_topic_roundtrip() {
        let raw = format_topic(7, "online-members");
        assert_eq!(parse_topic(&raw), Some((7, "online-members".to_string())));
    }
}
