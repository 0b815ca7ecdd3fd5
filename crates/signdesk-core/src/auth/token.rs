//! Session token payload decoding.
//!
//! Tokens are compact `header.payload.signature` strings. Only the payload is
//! read here, and the signature is never checked: the backend verifies it on
//! every request. Every decoding problem is reported as `None`, and every
//! `None` counts as expired.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::Role;

/// base64url with optional padding, as issued by common JWT libraries.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the middle segment of `token` into a JSON object.
pub fn decode_payload(token: &str) -> Option<Map<String, Value>> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments[1].is_empty() {
        debug!(segments = segments.len(), "Token is not a three-segment string");
        return None;
    }

    let bytes = match PAYLOAD_ENGINE.decode(segments[1]) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Token payload is not base64url");
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            debug!("Token payload is JSON but not an object");
            None
        }
        Err(e) => {
            debug!(error = %e, "Token payload is not JSON");
            None
        }
    }
}

/// Typed view over a decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    /// Expiry in Unix seconds, when present and numeric.
    pub exp: Option<i64>,
    pub role: RoleClaim,
    pub claims: Map<String, Value>,
}

/// What the token says about the holder's role.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleClaim {
    Absent,
    Valid(Role),
    /// Present but not a known role.
    Invalid(String),
}

impl TokenClaims {
    pub fn from_token(token: &str) -> Option<Self> {
        decode_payload(token).map(Self::from_payload)
    }

    pub fn from_payload(claims: Map<String, Value>) -> Self {
        let exp = claims.get("exp").and_then(numeric_seconds);
        let role = match claims.get("role") {
            None | Some(Value::Null) => RoleClaim::Absent,
            Some(Value::String(s)) => match s.parse::<Role>() {
                Ok(role) => RoleClaim::Valid(role),
                Err(_) => RoleClaim::Invalid(s.clone()),
            },
            Some(other) => RoleClaim::Invalid(other.to_string()),
        };
        Self { exp, role, claims }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.exp {
            Some(exp) => exp <= now,
            None => true,
        }
    }
}

/// `exp` may be serialized as an integer or a float; fractions are dropped.
fn numeric_seconds(value: &Value) -> Option<i64> {
    if let Some(secs) = value.as_i64() {
        return Some(secs);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.floor() as i64)
}

/// True unless `token` is present, decodable, carries a numeric `exp` and
/// `exp` is strictly after `now` (Unix seconds).
pub fn is_expired_at(token: Option<&str>, now: i64) -> bool {
    token
        .and_then(TokenClaims::from_token)
        .map(|claims| claims.is_expired_at(now))
        .unwrap_or(true)
}

pub fn is_expired(token: Option<&str>) -> bool {
    is_expired_at(token, Utc::now().timestamp())
}

/// Seconds left before expiry, or `None` when the token is already unusable.
pub fn seconds_until_expiry(token: &str, now: i64) -> Option<i64> {
    let exp = TokenClaims::from_token(token)?.exp?;
    (exp > now).then(|| exp - now)
}
