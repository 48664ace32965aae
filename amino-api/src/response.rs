//! API response envelope.
//!
//! All REST responses share a common envelope carrying a service status
//! code and message alongside the endpoint-specific payload:
//! `{"api:statuscode": 0, "api:message": "OK", ...}`.

use serde::Deserialize;

use amino_core::error::{AminoError, AminoResult, ApiErrorCode};

/// Standard response envelope.
///
/// Endpoint-specific fields stay in `data` as raw JSON; the payload schema
/// per endpoint is owned by the external object model.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    /// Service status code. 0 means success.
    #[serde(rename = "api:statuscode", default)]
    pub status_code: i32,

    /// Human-readable status message.
    #[serde(rename = "api:message", default)]
    pub message: String,

    /// Server-side processing duration, when reported.
    #[serde(rename = "api:duration", default)]
    pub duration: Option<String>,

    /// Remaining envelope fields (endpoint payload).
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl ApiResponse {
    /// Whether the envelope indicates success.
    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }

    /// Convert the envelope into a result, mapping non-zero status codes
    /// to errors. Credential-related codes become `AuthenticationFailed`.
    pub fn into_result(self) -> AminoResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let code = ApiErrorCode::from_code(self.status_code);
        if code.is_auth_failure() {
            return Err(AminoError::AuthenticationFailed(format!(
                "{} (code {})",
                self.message, self.status_code
            )));
        }
        Err(AminoError::Server {
            code: self.status_code,
            message: self.message,
        })
    }

    /// String field from the payload, by top-level key.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Nested string field from the payload, by JSON pointer.
    pub fn str_pointer(&self, pointer: &str) -> Option<&str> {
        self.data.pointer(pointer).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let json = r#"{"api:statuscode":0,"api:message":"OK","sid":"tok","auid":"uid-1"}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.str_field("sid"), Some("tok"));
        assert!(resp.into_result().is_ok());
    }

    #[test]
    fn test_auth_failure_envelope() {
        let json = r#"{"api:statuscode":200,"api:message":"Invalid account or password"}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.is_success());
        assert!(matches!(
            resp.into_result(),
            Err(AminoError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_server_error_envelope() {
        let json = r#"{"api:statuscode":219,"api:message":"Too many requests"}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        match resp.into_result() {
            Err(AminoError::Server { code, message }) => {
                assert_eq!(code, 219);
                assert_eq!(message, "Too many requests");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_nested_pointer() {
        let json = r#"{"api:statuscode":0,"account":{"uid":"uid-7"}}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.str_pointer("/account/uid"), Some("uid-7"));
    }

    #[test]
    fn test_missing_envelope_fields_default() {
        let resp: ApiResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.is_success());
        assert!(resp.message.is_empty());
    }
}
