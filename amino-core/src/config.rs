//! Bot configuration management.
//!
//! Handles loading, saving, and validating bot configuration: API base and
//! signing material, credentials, socket tuning, and command dispatch
//! settings. Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{AminoError, AminoResult};
use crate::platform::Platform;

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    /// API endpoint and signing settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Account credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Socket connection tuning.
    #[serde(default)]
    pub socket: SocketConfig,

    /// Command dispatch settings.
    #[serde(default)]
    pub commands: CommandConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API endpoint and request-signing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub base_url: String,

    /// WebSocket endpoint.
    #[serde(default = "default_socket_url")]
    pub socket_url: String,

    /// Device identifier sent with every request.
    #[serde(default)]
    pub device_id: String,

    /// Request signing key, base64-encoded.
    #[serde(default)]
    pub signature_key: String,

    /// Signature version byte prepended to every signature.
    #[serde(default = "default_signature_version")]
    pub signature_version: u8,

    /// Request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub timeout_ms: u64,
}

/// Account credentials. Exactly one mode must be configured: a session
/// token, or an email/password pair.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Session token to reuse instead of logging in.
    #[serde(default)]
    pub session: String,

    /// Account email for password login.
    #[serde(default)]
    pub email: String,

    /// Account password for password login.
    #[serde(default)]
    pub password: String,
}

/// Resolved credential mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Reuse an existing session token.
    Session(String),
    /// Authenticate with email and password.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
}

/// Socket connection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Heartbeat ping interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Seconds without inbound traffic before the connection is declared dead.
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_secs: u64,

    /// Base reconnect backoff delay in seconds.
    #[serde(default = "default_reconnect_base")]
    pub reconnect_base_delay_secs: u64,

    /// Maximum reconnect backoff delay in seconds.
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_delay_secs: u64,

    /// Jitter factor (0.0 to 1.0) applied to each backoff delay.
    #[serde(default = "default_jitter")]
    pub reconnect_jitter: f64,

    /// Maximum reconnect attempts before surfacing ConnectionLost
    /// (0 = retry indefinitely).
    #[serde(default)]
    pub reconnect_max_attempts: u32,
}

/// Command dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Literal prefix a chat message must start with to be a command.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Maximum concurrently running command handlers.
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Whether unresolved command names are reported back to the thread
    /// they were invoked from.
    #[serde(default)]
    pub report_unknown: bool,

    /// Whether the built-in help command is registered.
    #[serde(default = "default_true")]
    pub help_command: bool,

    /// Grace period for in-flight handlers at shutdown, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses the platform default.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output for the file layer.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_api_base() -> String {
    constants::DEFAULT_API_BASE.to_string()
}

fn default_socket_url() -> String {
    constants::DEFAULT_SOCKET_URL.to_string()
}

fn default_signature_version() -> u8 {
    constants::DEFAULT_SIGNATURE_VERSION
}

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_heartbeat_interval() -> u64 {
    constants::HEARTBEAT_INTERVAL_SECS
}

fn default_liveness_timeout() -> u64 {
    constants::LIVENESS_TIMEOUT_SECS
}

fn default_reconnect_base() -> u64 {
    constants::RECONNECT_BASE_DELAY_SECS
}

fn default_reconnect_max() -> u64 {
    constants::RECONNECT_MAX_DELAY_SECS
}

fn default_jitter() -> f64 {
    0.3
}

fn default_prefix() -> String {
    constants::DEFAULT_PREFIX.to_string()
}

fn default_concurrency() -> usize {
    constants::DEFAULT_COMMAND_CONCURRENCY
}

fn default_true() -> bool {
    true
}

fn default_shutdown_grace() -> u64 {
    constants::SHUTDOWN_GRACE_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            socket_url: default_socket_url(),
            device_id: String::new(),
            signature_key: String::new(),
            signature_version: default_signature_version(),
            timeout_ms: default_api_timeout(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            liveness_timeout_secs: default_liveness_timeout(),
            reconnect_base_delay_secs: default_reconnect_base(),
            reconnect_max_delay_secs: default_reconnect_max(),
            reconnect_jitter: default_jitter(),
            reconnect_max_attempts: 0,
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            max_concurrency: default_concurrency(),
            report_unknown: false,
            help_command: true,
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl BotConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> AminoResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> AminoResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BotConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> AminoResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AminoError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> AminoResult<PathBuf> {
        Ok(Platform::data_dir()?.join("config.toml"))
    }

    /// Get the effective log directory.
    pub fn effective_log_dir(&self) -> AminoResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Platform::log_dir()
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Resolve the configured credential mode.
    ///
    /// Exactly one mode must be present: a session token, or an
    /// email/password pair. Anything else is a configuration error,
    /// reported before any connection attempt.
    pub fn credentials(&self) -> AminoResult<Credentials> {
        let has_session = !self.auth.session.is_empty();
        let has_login = !self.auth.email.is_empty() || !self.auth.password.is_empty();

        match (has_session, has_login) {
            (true, true) => Err(AminoError::Config(
                "both session and email/password configured; pick one".into(),
            )),
            (true, false) => Ok(Credentials::Session(self.auth.session.clone())),
            (false, true) => {
                if self.auth.email.is_empty() || self.auth.password.is_empty() {
                    return Err(AminoError::MissingConfig(
                        "email login requires both auth.email and auth.password".into(),
                    ));
                }
                Ok(Credentials::Login {
                    email: self.auth.email.clone(),
                    password: self.auth.password.clone(),
                })
            }
            (false, false) => Err(AminoError::MissingConfig(
                "no credentials: set auth.session or auth.email/auth.password".into(),
            )),
        }
    }

    /// Validate the signing material needed for every request.
    pub fn validate_signing(&self) -> AminoResult<()> {
        if self.api.device_id.is_empty() {
            return Err(AminoError::MissingConfig("api.device_id".into()));
        }
        if self.api.signature_key.is_empty() {
            return Err(AminoError::MissingConfig("api.signature_key".into()));
        }
        Ok(())
    }
}
