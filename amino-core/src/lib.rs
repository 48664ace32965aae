//! Amino Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other amino crates:
//! - Bot configuration (credentials, signing material, socket tuning)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Platform directory utilities
//! - Common constants

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;

// Re-export commonly used items at the crate root
pub use config::BotConfig;
pub use error::{AminoError, AminoResult};
pub use logging::init_logging;
pub use platform::Platform;
