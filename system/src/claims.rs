use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

// Claims are read for display and local expiry only. The signature is not
// checked here; trust decisions belong to the backend.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    /// Expiry, seconds since the unix epoch.
    pub exp: u64,
}

impl Claims {
    pub fn is_valid_at(&self, now_secs: u64) -> bool {
        self.exp > now_secs
    }
}

#[derive(Debug)]
pub enum TokenError {
    Malformed,
    Base64(base64::DecodeError),
    Json(serde_json::Error),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => f.write_str("token must have three segments"),
            TokenError::Base64(e) => write!(f, "invalid payload encoding: {}", e),
            TokenError::Json(e) => write!(f, "invalid payload: {}", e),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<base64::DecodeError> for TokenError {
    fn from(e: base64::DecodeError) -> Self {
        TokenError::Base64(e)
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(e: serde_json::Error) -> Self {
        TokenError::Json(e)
    }
}

pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(TokenError::Malformed),
    };
    // Some issuers keep the padding.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(b"{\"alg\":\"HS256\",\"typ\":\"JWT\"}"),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}
