//! Event registration and demultiplexing.
//!
//! The demultiplexer consumes the connection manager's signal channel in
//! receive order and spawns one task per inbound frame. A frame's code is
//! looked up in the code map (unknown codes are logged and dropped),
//! decoded through the payload factory, and fanned out to every handler
//! bound to the event name, each as its own task. A failing handler is
//! reported through `on_error` and never disturbs its siblings, the
//! dispatcher, or the connection.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use amino_core::error::{AminoError, AminoResult};
use amino_socket::codes::{code, event, CodeMap};
use amino_socket::frame::{InboundFrame, OutboundFrame};
use amino_socket::manager::SocketSignal;

use crate::commands::CommandDispatcher;
use crate::context::Client;
use crate::model::{Event, Message, PayloadFactory};

/// Handler bound to an event name.
pub type EventHandler =
    Arc<dyn Fn(Client, Event) -> BoxFuture<'static, AminoResult<()>> + Send + Sync>;

/// Mapping from event name to the ordered handlers bound to it.
///
/// Built at setup time and frozen when the client runs; insertion order is
/// invocation order.
pub struct EventRegistry {
    codes: CodeMap,
    bindings: HashMap<String, Vec<EventHandler>>,
}

impl EventRegistry {
    /// Create a registry validating against the given code map.
    pub fn new(codes: CodeMap) -> Self {
        Self {
            codes,
            bindings: HashMap::new(),
        }
    }

    /// The code map used for validation and dispatch.
    pub fn codes(&self) -> &CodeMap {
        &self.codes
    }

    /// Mutable access to the code map, for registering protocol
    /// extensions before any handlers are bound.
    pub fn codes_mut(&mut self) -> &mut CodeMap {
        &mut self.codes
    }

    /// Bind a handler to an event name. The name must be a mapped event
    /// or one of the synthetic names.
    pub fn bind(&mut self, name: &str, handler: EventHandler) -> AminoResult<()> {
        if !self.codes.is_valid_event(name) {
            return Err(AminoError::Config(format!("unknown event name: {name}")));
        }
        self.bindings
            .entry(name.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }

    /// Handlers bound to an event name, in registration order.
    pub fn handlers_for(&self, name: &str) -> Vec<EventHandler> {
        self.bindings.get(name).cloned().unwrap_or_default()
    }

    /// Whether any handler is bound to the name.
    pub fn has_handlers(&self, name: &str) -> bool {
        self.bindings.get(name).is_some_and(|h| !h.is_empty())
    }
}

/// Routes inbound frames to event handlers and the command dispatcher.
pub struct EventDemultiplexer {
    events: Arc<EventRegistry>,
    factory: Arc<dyn PayloadFactory>,
    commands: Arc<CommandDispatcher>,
    client: Client,
}

impl EventDemultiplexer {
    /// Wire the demultiplexer.
    pub fn new(
        events: Arc<EventRegistry>,
        factory: Arc<dyn PayloadFactory>,
        commands: Arc<CommandDispatcher>,
        client: Client,
    ) -> Self {
        Self {
            events,
            factory,
            commands,
            client,
        }
    }

    /// Drain the signal channel until it closes or the connection is lost
    /// for good. Dispatch is initiated in receive order; one task per
    /// frame, so completion order is unordered.
    pub async fn run(self: Arc<Self>, mut signals: mpsc::Receiver<SocketSignal>) {
        while let Some(signal) = signals.recv().await {
            match signal {
                SocketSignal::Ready { resumed } => {
                    info!("connection ready (resumed: {resumed})");
                    self.fan_out(event::READY, Event::Ready);
                }
                SocketSignal::Frame(frame) => {
                    let demux = self.clone();
                    tokio::spawn(async move { demux.dispatch(frame).await });
                }
                SocketSignal::Lost { attempts } => {
                    warn!("connection lost after {attempts} attempt(s)");
                    self.fan_out(event::DISCONNECT, Event::Disconnected { attempts });
                    break;
                }
            }
        }
    }

    /// Route one frame. Unknown codes and undecodable payloads are
    /// dropped with a log line; they are never fatal.
    pub async fn dispatch(&self, frame: InboundFrame) {
        let codes = self.events.codes();
        let Some(event_name) = codes.event_for_code(frame.code) else {
            debug!("dropping frame with unmapped code {}", frame.code);
            return;
        };

        match frame.code {
            code::MESSAGE => match self.factory.message(&frame.payload) {
                Ok(message) => self.handle_message(event_name, message).await,
                Err(e) => warn!("undecodable chat message: {e}"),
            },
            code::NOTIFICATION => match self.factory.notification(&frame.payload) {
                Ok(notification) => {
                    let refined = codes
                        .event_for_notif_type(notification.notif_type)
                        .to_string();
                    self.fan_out(&refined, Event::Notification(notification));
                }
                Err(e) => warn!("undecodable notification: {e}"),
            },
            code::LIVE_LAYER_EVENT => match self.factory.live_event(&frame.payload) {
                Ok(live) => {
                    let refined = codes.event_for_topic(&live.topic).to_string();
                    self.fan_out(&refined, Event::Live(live));
                }
                Err(e) => warn!("undecodable live event: {e}"),
            },
            _ => self.fan_out(
                event_name,
                Event::Raw {
                    code: frame.code,
                    payload: frame.payload,
                },
            ),
        }
    }

    /// Chat messages additionally get acknowledged and forwarded to the
    /// command dispatcher (skipping the bot's own messages).
    async fn handle_message(&self, event_name: &str, message: Message) {
        self.fan_out(event_name, Event::Message(message.clone()));

        let ack =
            OutboundFrame::message_ack(message.community_id, &message.thread_id, &message.id);
        if let Err(e) = self.client.send_frame(ack).await {
            debug!("could not ack message {}: {e}", message.id);
        }

        if message.is_text() && message.author.id != self.client.uid() {
            self.commands.dispatch(&self.client, &message).await;
        }
    }

    /// Invoke every handler bound to `name`, started in registration
    /// order, each as an independent task.
    fn fan_out(&self, name: &str, event: Event) {
        let handlers = self.events.handlers_for(name);
        if handlers.is_empty() {
            debug!("no handlers bound for {name}");
            return;
        }
        for handler in handlers {
            let client = self.client.clone();
            let event = event.clone();
            let events = self.events.clone();
            let name = name.to_string();
            tokio::spawn(async move {
                if let Err(e) = handler(client.clone(), event).await {
                    report_handler_error(&events, &client, &name, e).await;
                }
            });
        }
    }
}

/// Route a failed handler to the `on_error` handlers. Failures inside
/// `on_error` itself are only logged, never re-routed.
async fn report_handler_error(
    events: &Arc<EventRegistry>,
    client: &Client,
    source: &str,
    error: AminoError,
) {
    warn!("handler for {source} failed: {error}");
    if source == event::ERROR {
        return;
    }
    let event = Event::HandlerError {
        event: source.to_string(),
        error: error.to_string(),
    };
    for handler in events.handlers_for(event::ERROR) {
        let client = client.clone();
        let event = event.clone();
        tokio::spawn(async move {
            if let Err(e) = handler(client, event).await {
                warn!("on_error handler failed: {e}");
            }
        });
    }
}
