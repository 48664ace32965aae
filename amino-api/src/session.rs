//! Session tokens.
//!
//! A session token is URL-safe base64. Stripping the leading version byte
//! and the trailing 20-byte signature leaves a JSON map keyed by short
//! numeric strings: `"2"` is the account uid, `"4"` the client ip, `"5"`
//! the creation time, `"6"` the client type. Parsing a user-supplied token
//! therefore yields the account identity without a login round-trip.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use amino_core::error::{AminoError, AminoResult};

/// Length of the trailing signature on a session token payload.
const TOKEN_SIGNATURE_LEN: usize = 20;

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The raw session token, as sent in the auth header.
    pub token: String,
    /// Account uid the session belongs to.
    pub uid: String,
    /// Client ip recorded in the token, if known.
    pub ip: Option<String>,
    /// Creation time recorded in the token (unix seconds), if known.
    pub created: Option<i64>,
    /// Client type recorded in the token, if known.
    pub client_type: Option<i32>,
}

#[derive(Deserialize)]
struct TokenPayload {
    #[serde(rename = "2")]
    uid: String,
    #[serde(rename = "4", default)]
    ip: Option<String>,
    #[serde(rename = "5", default)]
    created: Option<i64>,
    #[serde(rename = "6", default)]
    client_type: Option<i32>,
}

impl Session {
    /// Parse a session token into a Session.
    pub fn parse(token: &str) -> AminoResult<Self> {
        let stripped = token.trim_end_matches('=');
        let raw = URL_SAFE_NO_PAD
            .decode(stripped)
            .map_err(|e| AminoError::Crypto(format!("invalid session token: {e}")))?;

        if raw.len() <= 1 + TOKEN_SIGNATURE_LEN {
            return Err(AminoError::Crypto("session token too short".into()));
        }
        let payload = &raw[1..raw.len() - TOKEN_SIGNATURE_LEN];
        let parsed: TokenPayload = serde_json::from_slice(payload)
            .map_err(|e| AminoError::Crypto(format!("invalid session payload: {e}")))?;

        Ok(Self {
            token: token.to_string(),
            uid: parsed.uid,
            ip: parsed.ip,
            created: parsed.created,
            client_type: parsed.client_type,
        })
    }

    /// Build a session from a login response, where the uid is known
    /// directly and the token need not be introspected.
    pub fn from_login(token: &str, uid: &str) -> Self {
        Self {
            token: token.to_string(),
            uid: uid.to_string(),
            ip: None,
            created: None,
            client_type: None,
        }
    }

    /// Value for the session auth header.
    pub fn auth_header(&self) -> String {
        format!("sid={}", self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(json: &str) -> String {
        let mut raw = vec![0x02u8];
        raw.extend_from_slice(json.as_bytes());
        raw.extend_from_slice(&[0u8; TOKEN_SIGNATURE_LEN]);
        URL_SAFE_NO_PAD.encode(raw)
    }

    #[test]
    fn test_parse_token() {
        let token =
            make_token(r#"{"2":"uid-123","4":"203.0.113.9","5":1700000000,"6":100}"#);
        let session = Session::parse(&token).unwrap();
        assert_eq!(session.uid, "uid-123");
        assert_eq!(session.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(session.created, Some(1_700_000_000));
        assert_eq!(session.client_type, Some(100));
        assert_eq!(session.auth_header(), format!("sid={token}"));
    }

    #[test]
    fn test_parse_token_minimal_fields() {
        let token = make_token(r#"{"2":"uid-only"}"#);
        let session = Session::parse(&token).unwrap();
        assert_eq!(session.uid, "uid-only");
        assert!(session.ip.is_none());
    }

    #[test]
    fn test_parse_token_with_padding() {
        let token = format!("{}==", make_token(r#"{"2":"padded"}"#));
        let session = Session::parse(&token).unwrap();
        assert_eq!(session.uid, "padded");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Session::parse("!!!not a token!!!").is_err());
        assert!(Session::parse("AAAA").is_err());
    }

    #[test]
    fn test_from_login() {
        let session = Session::from_login("tok", "uid-9");
        assert_eq!(session.uid, "uid-9");
        assert_eq!(session.auth_header(), "sid=tok");
    }
}
