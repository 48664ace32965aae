//! Signed HTTP gateway for the service REST API.
//!
//! Wraps reqwest::Client with request signing, session auth, exponential
//! backoff retry on transient failures, and envelope parsing. The bot core
//! depends on this gateway for login and for the generic "send signed
//! request" capability; the wider endpoint catalog is out of scope.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use amino_core::config::ApiConfig;
use amino_core::error::{AminoError, AminoResult};

use crate::response::ApiResponse;
use crate::session::Session;
use crate::signer::{self, Signer, AUTH_HEADER};

/// Retry configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            retryable_statuses: vec![502, 503, 504],
        }
    }
}

/// Signed HTTP client for the REST API.
pub struct ApiGateway {
    inner: Client,
    base: String,
    signer: Signer,
    session: RwLock<Option<Session>>,
    retry_config: RetryConfig,
}

impl ApiGateway {
    /// Create a gateway from API configuration.
    pub fn new(config: &ApiConfig) -> AminoResult<Self> {
        let signer = Signer::new(
            &config.device_id,
            &config.signature_key,
            config.signature_version,
        )?;

        let inner = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(15))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| AminoError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            base: config.base_url.trim_end_matches('/').to_string(),
            signer,
            session: RwLock::new(None),
            retry_config: RetryConfig::default(),
        })
    }

    /// Set custom retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// The signer used for request and handshake signatures.
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// The current session, if authenticated.
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Attach an already-established session.
    pub async fn attach_session(&self, session: Session) {
        let mut guard = self.session.write().await;
        *guard = Some(session);
    }

    /// Build the full URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Execute a signed request with exponential backoff retry, returning
    /// the parsed envelope. Non-zero envelope codes become errors.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> AminoResult<ApiResponse> {
        let url = self.url(path);
        debug!("{} {}", method, path);

        let body_bytes = match body {
            Some(value) => Some(serde_json::to_vec(value)?),
            None => None,
        };
        let sid = {
            let guard = self.session.read().await;
            guard.as_ref().map(|s| s.auth_header())
        };

        let mut last_error: Option<AminoError> = None;

        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                let delay = self.retry_delay(attempt - 1);
                warn!(
                    "retrying {} {} (attempt {}/{}) after {:.1}s",
                    method,
                    path,
                    attempt + 1,
                    self.retry_config.max_retries + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            let mut builder = self.inner.request(method.clone(), &url);
            for (key, value) in self.signer.headers(body_bytes.as_deref())? {
                builder = builder.header(key, value);
            }
            if let Some(ref sid) = sid {
                builder = builder.header(AUTH_HEADER, sid);
            }
            if let Some(ref bytes) = body_bytes {
                builder = builder
                    .header("Content-Type", "application/json; charset=utf-8")
                    .body(bytes.clone());
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();

                    if self
                        .retry_config
                        .retryable_statuses
                        .contains(&status.as_u16())
                        && attempt < self.retry_config.max_retries
                    {
                        warn!("retryable status {} from {}", status.as_u16(), path);
                        last_error = Some(AminoError::Http(format!(
                            "retryable status {status} from {path}"
                        )));
                        continue;
                    }

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(AminoError::AuthenticationFailed(format!(
                            "server returned {status}"
                        )));
                    }

                    let envelope: ApiResponse = response.json().await.map_err(|e| {
                        AminoError::Serialization(format!("failed to parse response: {e}"))
                    })?;
                    return envelope.into_result();
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let err = classify_error(e);

                    if is_retryable && attempt < self.retry_config.max_retries {
                        warn!("retryable error on {}: {}", path, err);
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AminoError::Http("max retries exceeded".into())))
    }

    /// Calculate retry delay with exponential backoff.
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_config.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        let max_ms = self.retry_config.max_delay.as_millis() as u64;
        Duration::from_millis(delay_ms.min(max_ms))
    }

    /// Execute a GET request.
    pub async fn get(&self, path: &str) -> AminoResult<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    /// Execute a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> AminoResult<ApiResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    // --- Endpoints the bot core depends on ---

    /// Log in with email and password, storing and returning the session.
    ///
    /// Credential rejections surface as `AuthenticationFailed` and are not
    /// retried.
    pub async fn login(&self, email: &str, password: &str) -> AminoResult<Session> {
        let body = serde_json::json!({
            "email": email,
            "v": 2,
            "secret": format!("0 {password}"),
            "deviceID": self.signer.device_id(),
            "clientType": 100,
            "action": "normal",
            "timestamp": signer::timestamp_ms(),
        });

        let resp = self.post("/g/s/auth/login", &body).await?;
        let sid = resp
            .str_field("sid")
            .ok_or_else(|| AminoError::AuthenticationFailed("login response missing sid".into()))?;
        let uid = resp
            .str_field("auid")
            .or_else(|| resp.str_pointer("/account/uid"))
            .ok_or_else(|| AminoError::AuthenticationFailed("login response missing uid".into()))?;

        let session = Session::from_login(sid, uid);
        self.attach_session(session.clone()).await;
        Ok(session)
    }

    /// Send a text message to a chat thread.
    ///
    /// `community_id` 0 targets the global scope. `reply_to` threads the
    /// message onto an existing one.
    pub async fn send_message(
        &self,
        community_id: u64,
        thread_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> AminoResult<ApiResponse> {
        if content.len() > amino_core::constants::MAX_MESSAGE_LENGTH {
            return Err(AminoError::Internal(format!(
                "message exceeds {} characters",
                amino_core::constants::MAX_MESSAGE_LENGTH
            )));
        }

        let now = signer::timestamp_ms();
        let mut body = serde_json::json!({
            "content": content,
            "type": 0,
            "clientRefId": now % 86_400_000,
            "timestamp": now,
        });
        if let Some(reply_to) = reply_to {
            body["replyMessageId"] = serde_json::Value::String(reply_to.to_string());
        }

        let path = format!(
            "{}/s/chat/thread/{}/message",
            scope_segment(community_id),
            thread_id
        );
        self.post(&path, &body).await
    }

    /// Fetch a user profile.
    pub async fn fetch_user(&self, community_id: u64, uid: &str) -> AminoResult<ApiResponse> {
        let path = format!("{}/s/user-profile/{}", scope_segment(community_id), uid);
        self.get(&path).await
    }
}

/// URL scope segment for a community id (0 = global scope).
fn scope_segment(community_id: u64) -> String {
    if community_id == 0 {
        "/g".to_string()
    } else {
        format!("/x{community_id}")
    }
}

/// Classify a reqwest error into an AminoError variant.
fn classify_error(e: reqwest::Error) -> AminoError {
    if e.is_timeout() {
        AminoError::Timeout(e.to_string())
    } else if e.is_connect() {
        AminoError::Http(format!("connection failed: {e}"))
    } else {
        AminoError::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ApiConfig {
        ApiConfig {
            base_url: "http://localhost:1234/api/v1".into(),
            socket_url: "ws://localhost:1234".into(),
            device_id: "42deadbeef".into(),
            signature_key: "c2VjcmV0LWtleQ==".into(),
            signature_version: 0x42,
            timeout_ms: 30_000,
        }
    }

    #[test]
    fn test_scope_segment() {
        assert_eq!(scope_segment(0), "/g");
        assert_eq!(scope_segment(123), "/x123");
    }

    #[test]
    fn test_url_building() {
        let gateway = ApiGateway::new(&test_config()).unwrap();
        assert_eq!(
            gateway.url("/g/s/auth/login"),
            "http://localhost:1234/api/v1/g/s/auth/login"
        );
    }

    #[test]
    fn test_retry_delay_sequence() {
        let gateway = ApiGateway::new(&test_config()).unwrap();
        assert_eq!(gateway.retry_delay(0), Duration::from_secs(1));
        assert_eq!(gateway.retry_delay(1), Duration::from_secs(2));
        assert_eq!(gateway.retry_delay(2), Duration::from_secs(4));
        // Capped at max_delay
        assert_eq!(gateway.retry_delay(10), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_session_attach() {
        let gateway = ApiGateway::new(&test_config()).unwrap();
        assert!(gateway.session().await.is_none());

        gateway
            .attach_session(Session::from_login("tok", "uid-1"))
            .await;
        let session = gateway.session().await.unwrap();
        assert_eq!(session.uid, "uid-1");
    }

    #[tokio::test]
    async fn test_send_message_length_cap() {
        let gateway = ApiGateway::new(&test_config()).unwrap();
        let long = "x".repeat(amino_core::constants::MAX_MESSAGE_LENGTH + 1);
        let result = gateway.send_message(0, "thread-1", &long, None).await;
        assert!(result.is_err());
    }
}
