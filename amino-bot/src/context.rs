//! Client handle and per-invocation context.
//!
//! Handlers never touch global state: every invocation receives a `Client`
//! (the send capability) and, for commands, a `Context` bundling the
//! triggering message with it. The capability sits behind the
//! `MessageSender` trait so the dispatch pipeline can be exercised without
//! a live gateway or socket.

use std::sync::Arc;

use async_trait::async_trait;

use amino_api::ApiGateway;
use amino_core::error::{AminoError, AminoResult};
use amino_socket::frame::OutboundFrame;
use amino_socket::manager::{ConnectionManager, ConnectionState};

use crate::model::Message;

/// Outbound capability handed to every handler invocation.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a text message into a thread.
    async fn send_text(
        &self,
        community_id: u64,
        thread_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> AminoResult<()>;

    /// Send a raw frame on the socket.
    async fn send_frame(&self, frame: OutboundFrame) -> AminoResult<()>;

    /// Subscribe to a live-layer topic.
    async fn subscribe(&self, community_id: u64, topic: &str) -> AminoResult<()>;

    /// Unsubscribe from a live-layer topic.
    async fn unsubscribe(&self, community_id: u64, topic: &str) -> AminoResult<()>;
}

/// Production sender backed by the gateway and the socket connection.
///
/// Sends are refused with `NotConnected` while the connection is not live,
/// so a handler outliving a dropped connection observes the failure at its
/// next send rather than anywhere else.
pub struct LiveSender {
    gateway: Arc<ApiGateway>,
    socket: ConnectionManager,
}

impl LiveSender {
    /// Bundle the gateway and socket into a sender.
    pub fn new(gateway: Arc<ApiGateway>, socket: ConnectionManager) -> Self {
        Self { gateway, socket }
    }

    async fn ensure_connected(&self) -> AminoResult<()> {
        match self.socket.state().await {
            ConnectionState::Ready | ConnectionState::Subscribing => Ok(()),
            _ => Err(AminoError::NotConnected),
        }
    }
}

#[async_trait]
impl MessageSender for LiveSender {
    async fn send_text(
        &self,
        community_id: u64,
        thread_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> AminoResult<()> {
        self.ensure_connected().await?;
        self.gateway
            .send_message(community_id, thread_id, content, reply_to)
            .await
            .map(|_| ())
    }

    async fn send_frame(&self, frame: OutboundFrame) -> AminoResult<()> {
        self.socket.send(frame).await
    }

    async fn subscribe(&self, community_id: u64, topic: &str) -> AminoResult<()> {
        self.socket.subscribe(community_id, topic).await
    }

    async fn unsubscribe(&self, community_id: u64, topic: &str) -> AminoResult<()> {
        self.socket.unsubscribe(community_id, topic).await
    }
}

/// Cheaply cloneable client handle passed into every handler.
#[derive(Clone)]
pub struct Client {
    sender: Arc<dyn MessageSender>,
    uid: Arc<str>,
}

impl Client {
    /// Build a client over a sender and the bot's own account uid.
    pub fn new(sender: Arc<dyn MessageSender>, uid: &str) -> Self {
        Self {
            sender,
            uid: Arc::from(uid),
        }
    }

    /// The bot's own account uid.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Send a text message into a thread.
    pub async fn send_message(
        &self,
        community_id: u64,
        thread_id: &str,
        content: &str,
    ) -> AminoResult<()> {
        self.sender
            .send_text(community_id, thread_id, content, None)
            .await
    }

    /// Send a raw frame on the socket.
    pub async fn send_frame(&self, frame: OutboundFrame) -> AminoResult<()> {
        self.sender.send_frame(frame).await
    }

    /// Subscribe to a live-layer topic.
    pub async fn subscribe(&self, community_id: u64, topic: &str) -> AminoResult<()> {
        self.sender.subscribe(community_id, topic).await
    }

    /// Unsubscribe from a live-layer topic.
    pub async fn unsubscribe(&self, community_id: u64, topic: &str) -> AminoResult<()> {
        self.sender.unsubscribe(community_id, topic).await
    }
}

/// Per-invocation context handed to a command handler. Owned by the single
/// invocation that created it and dropped when the handler finishes.
#[derive(Clone)]
pub struct Context {
    /// The client handle.
    pub client: Client,
    /// The message that triggered the command.
    pub message: Message,
    /// Resolved command name.
    pub command: String,
}

impl Context {
    /// Build a context for one invocation.
    pub fn new(client: Client, message: Message, command: &str) -> Self {
        Self {
            client,
            message,
            command: command.to_string(),
        }
    }

    /// Send a message into the thread the command came from.
    pub async fn send(&self, content: &str) -> AminoResult<()> {
        self.client
            .sender
            .send_text(
                self.message.community_id,
                &self.message.thread_id,
                content,
                None,
            )
            .await
    }

    /// Reply to the triggering message.
    pub async fn reply(&self, content: &str) -> AminoResult<()> {
        self.client
            .sender
            .send_text(
                self.message.community_id,
                &self.message.thread_id,
                content,
                Some(&self.message.id),
            )
            .await
    }
}
