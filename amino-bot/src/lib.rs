//! Amino Bot - the bot client surface and dispatch engine.
//!
//! This crate ties the signed HTTP gateway and the socket connection into
//! a bot framework:
//! - The external object model (messages, notifications, live events) and
//!   the payload factory that decodes raw frames into it
//! - The event demultiplexer: code lookup, factory decoding, fan-out to
//!   bound handlers with per-handler failure isolation
//! - The command dispatcher: prefix parsing, positional argument
//!   conversion, bounded-concurrency handler invocation
//! - The `Bot` builder surface: `on`, `command`, `subscribe`, `run`

pub mod bot;
pub mod commands;
pub mod context;
pub mod events;
pub mod help;
pub mod model;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export key types
pub use bot::Bot;
pub use commands::{ArgKind, ArgValue, Args, CommandBuilder, CommandDispatcher, ParamSpec};
pub use context::{Client, Context, MessageSender};
pub use events::{EventDemultiplexer, EventRegistry};
pub use model::{Author, Event, JsonPayloadFactory, LiveEvent, Message, Notification, PayloadFactory};
