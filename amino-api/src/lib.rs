//! Amino API - signed HTTP gateway for the service REST API.
//!
//! This crate provides:
//! - Request signing (HMAC-SHA1 with a version byte, base64-encoded)
//! - Session token parsing and the session auth header
//! - The response envelope (`api:statuscode` / `api:message`) and its
//!   status-code -> error mapping
//! - A reqwest-based gateway with retry/backoff and the login,
//!   send-message, and fetch-user endpoints the bot core depends on

pub mod gateway;
pub mod response;
pub mod session;
pub mod signer;

// Re-export key types
pub use gateway::{ApiGateway, RetryConfig};
pub use response::ApiResponse;
pub use session::Session;
pub use signer::Signer;
