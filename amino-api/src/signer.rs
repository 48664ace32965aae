//! Request signing.
//!
//! Every API request body is signed with HMAC-SHA1; the digest is prefixed
//! with a version byte and base64-encoded into the `NDC-MSG-SIG` header.
//! The socket handshake signs `"{device}|{timestamp_ms}"` the same way and
//! carries it as the `signbody` query parameter.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use amino_core::constants;
use amino_core::error::{AminoError, AminoResult};

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "NDC-MSG-SIG";

/// Header carrying the device identifier.
pub const DEVICE_HEADER: &str = "NDCDEVICEID";

/// Header carrying the session id.
pub const AUTH_HEADER: &str = "NDCAUTH";

/// Signs outgoing request bodies and the socket handshake.
#[derive(Clone)]
pub struct Signer {
    device_id: String,
    key: Vec<u8>,
    version: u8,
}

impl Signer {
    /// Create a signer from a device id and a base64-encoded key.
    pub fn new(device_id: &str, key_b64: &str, version: u8) -> AminoResult<Self> {
        let key = BASE64
            .decode(key_b64)
            .map_err(|e| AminoError::Crypto(format!("invalid signature key: {e}")))?;
        if key.is_empty() {
            return Err(AminoError::Crypto("empty signature key".into()));
        }
        Ok(Self {
            device_id: device_id.to_string(),
            key,
            version,
        })
    }

    /// The device identifier this signer was built for.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Sign a request body: base64(version byte || HMAC-SHA1(key, body)).
    pub fn signature(&self, body: &[u8]) -> AminoResult<String> {
        let mut mac = HmacSha1::new_from_slice(&self.key)
            .map_err(|e| AminoError::Crypto(format!("hmac init failed: {e}")))?;
        mac.update(body);
        let digest = mac.finalize().into_bytes();

        let mut raw = Vec::with_capacity(1 + digest.len());
        raw.push(self.version);
        raw.extend_from_slice(&digest);
        Ok(BASE64.encode(raw))
    }

    /// Base header set for a signed request. The signature header is only
    /// present when there is a body to sign.
    pub fn headers(&self, body: Option<&[u8]>) -> AminoResult<Vec<(String, String)>> {
        let mut headers = vec![
            (DEVICE_HEADER.to_string(), self.device_id.clone()),
            ("Accept-Language".to_string(), "en-US".to_string()),
            ("User-Agent".to_string(), user_agent()),
        ];
        if let Some(body) = body {
            headers.push((SIGNATURE_HEADER.to_string(), self.signature(body)?));
        }
        Ok(headers)
    }

    /// The sign-body string for the socket handshake.
    pub fn socket_sign_body(&self, timestamp_ms: i64) -> String {
        format!("{}|{}", self.device_id, timestamp_ms)
    }
}

/// User-Agent sent with every request.
pub fn user_agent() -> String {
    format!(
        "{}/{} (+{})",
        constants::APP_NAME,
        constants::APP_VERSION,
        "https://github.com/aminobot-rs/aminobot"
    )
}

/// Current unix time in milliseconds.
pub fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
