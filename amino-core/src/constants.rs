//! Framework-wide constants.

/// Application name.
pub const APP_NAME: &str = "aminobot";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://service.narvii.com/api/v1";

/// Default WebSocket endpoint.
pub const DEFAULT_SOCKET_URL: &str = "wss://ws1.narvii.com";

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "/";

/// Default API request timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Default signature version byte prepended to request signatures.
pub const DEFAULT_SIGNATURE_VERSION: u8 = 0x42;

/// Heartbeat ping interval in seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;

/// Seconds without any inbound frame before the connection is declared dead.
pub const LIVENESS_TIMEOUT_SECS: u64 = 60;

/// Base reconnect backoff delay in seconds.
pub const RECONNECT_BASE_DELAY_SECS: u64 = 1;

/// Maximum reconnect backoff delay in seconds.
pub const RECONNECT_MAX_DELAY_SECS: u64 = 30;

/// Default concurrent command handler cap.
pub const DEFAULT_COMMAND_CONCURRENCY: usize = 8;

/// Grace period for in-flight command handlers at shutdown, in seconds.
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

/// Maximum chat message content length accepted by the service.
pub const MAX_MESSAGE_LENGTH: usize = 2000;
