//! Shared test doubles for the dispatch pipeline.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use amino_core::error::{AminoError, AminoResult};
use amino_socket::frame::OutboundFrame;

use crate::context::{Client, MessageSender};
use crate::model::{Author, Message};

/// One recorded text send.
#[derive(Debug, Clone)]
pub struct SentText {
    pub community_id: u64,
    pub thread_id: String,
    pub content: String,
    pub reply_to: Option<String>,
}

/// Sender that records every outbound call instead of performing it.
#[derive(Default)]
pub struct RecordingSender {
    texts: Mutex<Vec<SentText>>,
    frames: Mutex<Vec<OutboundFrame>>,
    pub fail_sends: std::sync::atomic::AtomicBool,
}

impl RecordingSender {
    pub fn texts(&self) -> Vec<SentText> {
        self.texts.lock().unwrap().clone()
    }

    pub fn frames(&self) -> Vec<OutboundFrame> {
        self.frames.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(
        &self,
        community_id: u64,
        thread_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> AminoResult<()> {
        if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AminoError::NotConnected);
        }
        self.texts.lock().unwrap().push(SentText {
            community_id,
            thread_id: thread_id.to_string(),
            content: content.to_string(),
            reply_to: reply_to.map(String::from),
        });
        Ok(())
    }

    async fn send_frame(&self, frame: OutboundFrame) -> AminoResult<()> {
        if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AminoError::NotConnected);
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    async fn subscribe(&self, _community_id: u64, _topic: &str) -> AminoResult<()> {
        Ok(())
    }

    async fn unsubscribe(&self, _community_id: u64, _topic: &str) -> AminoResult<()> {
        Ok(())
    }
}

/// A plain text message for tests.
pub fn test_message(community_id: u64, thread_id: &str, author_uid: &str, content: &str) -> Message {
    Message {
        id: "msg-1".into(),
        thread_id: thread_id.into(),
        community_id,
        content: content.into(),
        kind: crate::model::MESSAGE_TYPE_TEXT,
        author: Author {
            id: author_uid.into(),
            nickname: "Tester".into(),
            icon: String::new(),
        },
        created_time: Some(1_700_000_000),
        extensions: serde_json::Value::Null,
    }
}

/// A client over a recording sender.
pub fn test_client(sender: Arc<RecordingSender>) -> Client {
    Client::new(sender, "bot-uid")
}
