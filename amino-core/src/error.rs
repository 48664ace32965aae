//! Global error types for the amino client framework.
//!
//! All error categories across the workspace are unified into a single
//! `AminoError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using AminoError.
pub type AminoResult<T> = Result<T, AminoError>;

/// Unified error type covering all error categories in the framework.
#[derive(Error, Debug)]
pub enum AminoError {
    // -- Configuration errors --
    /// Failed to load or parse configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Authentication --
    /// Login or socket handshake was rejected. Fatal, aborts startup.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    // -- Network errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Socket connection error.
    #[error("socket error: {0}")]
    Socket(String),

    /// A send was attempted while the connection is not ready.
    #[error("not connected")]
    NotConnected,

    /// Reconnection retries were exhausted under the configured cap.
    #[error("connection lost after {attempts} attempt(s)")]
    ConnectionLost {
        /// Number of reconnect attempts made before giving up.
        attempts: u32,
    },

    /// The API returned a non-zero status code in its response envelope.
    #[error("server error {code}: {message}")]
    Server {
        /// `api:statuscode` value from the response envelope.
        code: i32,
        /// `api:message` value from the response envelope.
        message: String,
    },

    // -- Command errors --
    /// No command registered under the invoked name or alias.
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// A command was registered twice under the same name or alias.
    #[error("duplicate command: {0}")]
    DuplicateCommand(String),

    /// A required command parameter was not supplied.
    #[error("missing argument: {param}")]
    MissingArgument {
        /// Name of the first missing parameter.
        param: String,
    },

    /// A supplied token failed its declared type conversion.
    #[error("bad argument for {param}: {value:?}")]
    BadArgument {
        /// Name of the parameter whose conversion failed.
        param: String,
        /// The offending token.
        value: String,
    },

    /// More tokens were supplied than the command declares.
    #[error("too many arguments: expected {expected}, got {got}")]
    TooManyArguments {
        /// Number of declared parameters.
        expected: usize,
        /// Number of tokens received.
        got: usize,
    },

    // -- Data errors --
    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Signature or token decoding error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for AminoError {
    fn from(e: serde_json::Error) -> Self {
        AminoError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for AminoError {
    fn from(e: toml::de::Error) -> Self {
        AminoError::Config(e.to_string())
    }
}

impl AminoError {
    /// Whether this error aborts the whole client rather than being
    /// recovered internally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_)
                | Self::Config(_)
                | Self::MissingConfig(_)
                | Self::DuplicateCommand(_)
        )
    }

    /// Whether this error belongs to the command pipeline and is reported
    /// to the invoking context instead of propagating.
    pub fn is_command_error(&self) -> bool {
        matches!(
            self,
            Self::CommandNotFound(_)
                | Self::MissingArgument { .. }
                | Self::BadArgument { .. }
                | Self::TooManyArguments { .. }
        )
    }
}

/// API status codes returned in the `api:statuscode` envelope field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum ApiErrorCode {
    /// Request succeeded.
    Ok = 0,
    /// The requested service is not supported.
    UnsupportedService = 100,
    /// Malformed request body.
    InvalidRequest = 103,
    /// The session is expired or malformed.
    InvalidSession = 105,
    /// Access denied to the resource.
    AccessDenied = 106,
    /// The action is not allowed for this account.
    ActionNotAllowed = 110,
    /// Wrong email or password.
    InvalidAccountOrPassword = 200,
    /// The device identifier was rejected.
    InvalidDevice = 218,
    /// Rate limited.
    TooManyRequests = 219,
    /// Unknown error code.
    Unknown = -1,
}

impl ApiErrorCode {
    /// Convert an integer envelope code to an ApiErrorCode variant.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            100 => Self::UnsupportedService,
            103 | 104 => Self::InvalidRequest,
            105 => Self::InvalidSession,
            106 => Self::AccessDenied,
            110 => Self::ActionNotAllowed,
            200 => Self::InvalidAccountOrPassword,
            218 => Self::InvalidDevice,
            219 => Self::TooManyRequests,
            _ => Self::Unknown,
        }
    }

    /// Whether this code means the credentials themselves were rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidSession | Self::InvalidAccountOrPassword | Self::InvalidDevice
        )
    }
}
