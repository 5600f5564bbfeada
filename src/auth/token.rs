//! Structural bearer-token decoding.
//!
//! The token is split into its three segments and the header and payload are
//! decoded as JSON. The signature segment is NOT verified: integrity is the
//! issuer's responsibility, and anything that needs it must check the
//! signature before trusting the claims.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{ClientId, Error, Result};

/// base64url that tolerates both padded and unpadded segments.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Authentication context derived from a decoded bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    /// The raw token, kept so uploads can be re-authenticated as the caller.
    #[serde(skip)]
    pub token: String,
    pub client_id: ClientId,
    pub scopes: Vec<String>,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: i64,
}

impl AuthInfo {
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.expires_at < now_secs
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Decode a raw bearer credential into an [`AuthInfo`].
pub fn decode_bearer(raw: &str) -> Result<AuthInfo> {
    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(Error::malformed_token(format!(
            "expected 3 non-empty segments, got {}",
            segments.len()
        )));
    }

    let header = decode_segment(segments[0], "header")?;
    let payload = decode_segment(segments[1], "payload")?;

    match header.get("typ").and_then(Value::as_str) {
        Some("JWT") => {}
        Some(other) => return Err(Error::UnsupportedTokenType(other.to_string())),
        None => return Err(Error::UnsupportedTokenType("<missing typ>".to_string())),
    }

    let client_id = payload
        .get("client_id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::missing_claim("client_id"))?;
    let client_id = ClientId::from_string(client_id.to_string())
        .map_err(|_| Error::missing_claim("client_id"))?;

    let scopes = payload
        .get("scope")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::missing_claim("scope"))?
        .split(' ')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let expires_at = payload
        .get("exp")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::missing_claim("exp"))?;

    Ok(AuthInfo {
        token: raw.to_string(),
        client_id,
        scopes,
        expires_at,
    })
}

fn decode_segment(segment: &str, which: &str) -> Result<Map<String, Value>> {
    let bytes = SEGMENT_ENGINE
        .decode(segment)
        .map_err(|e| Error::malformed_token(format!("{} is not base64url: {}", which, e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| Error::malformed_token(format!("{} is not UTF-8", which)))?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::malformed_token(format!("{} is not a JSON object", which))),
        Err(e) => Err(Error::malformed_token(format!("{} is not JSON: {}", which, e))),
    }
}

/// Build an unsigned token from header and payload JSON. Test and bench helper.
#[doc(hidden)]
pub fn encode_unsigned(header: &Value, payload: &Value) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.sig",
        engine.encode(header.to_string()),
        engine.encode(payload.to_string())
    )
}
