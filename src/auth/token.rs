// Structural validation of bearer tokens
//
// Tokens are JWT-shaped: header.payload.signature, each segment base64url.
// Only the payload is inspected; signatures are the server's business.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::Utc;
use serde_json::Value;

use crate::error::{Result, SessionError};

/// base64url that tolerates both padded and unpadded segments
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Validate a token and return its expiry in milliseconds, if it has one
pub fn validate(token: &str) -> Result<Option<i64>> {
    let payload = decode_payload(token)?;

    let Some(exp) = payload.get("exp") else {
        return Ok(None);
    };

    let exp = exp
        .as_f64()
        .ok_or_else(|| invalid("exp claim is not a number"))?;
    let expires_at = (exp * 1000.0) as i64;

    if expires_at <= Utc::now().timestamp_millis() {
        tracing::warn!(expires_at, "Token has expired");
        return Err(invalid("token has expired"));
    }

    Ok(Some(expires_at))
}

/// Decode the middle segment as a JSON object
fn decode_payload(token: &str) -> Result<serde_json::Map<String, Value>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(invalid("token must have 3 parts separated by dots"));
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(invalid("token has an empty segment"));
    }
    for part in [parts[0], parts[2]] {
        URL_SAFE_LENIENT
            .decode(part)
            .map_err(|e| invalid(&format!("segment is not base64url: {}", e)))?;
    }

    let payload_bytes = URL_SAFE_LENIENT
        .decode(parts[1])
        .map_err(|e| invalid(&format!("failed to decode payload: {}", e)))?;

    match serde_json::from_slice::<Value>(&payload_bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(invalid("payload is not a JSON object")),
        Err(e) => Err(invalid(&format!("failed to parse payload: {}", e))),
    }
}

fn invalid(reason: &str) -> SessionError {
    SessionError::InvalidCredential(reason.to_string())
}

/// Build an unsigned JWT-shaped token for tests
#[cfg(test)]
pub fn make_test_token(exp: Option<i64>) -> String {
    let header = URL_SAFE_LENIENT.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = match exp {
        Some(exp) => serde_json::json!({ "sub": "household", "exp": exp }),
        None => serde_json::json!({ "sub": "household" }),
    };
    let payload = URL_SAFE_LENIENT.encode(claims.to_string());
    let signature = URL_SAFE_LENIENT.encode(b"signature");
    format!("{}.{}.{}", header, payload, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_one_hour() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token_with_exp() {
        let exp = in_one_hour();
        let token = make_test_token(Some(exp));
        assert_eq!(validate(&token).unwrap(), Some(exp * 1000));
    }

    #[test]
    fn test_valid_token_without_exp() {
        let token = make_test_token(None);
        assert_eq!(validate(&token).unwrap(), None);
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = make_test_token(Some(Utc::now().timestamp() - 60));
        let err = validate(&token).unwrap_err();
        assert!(matches!(err, SessionError::InvalidCredential(_)));
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_exp_exactly_now_is_expired() {
        let token = make_test_token(Some(Utc::now().timestamp()));
        assert!(validate(&token).is_err());
    }

    #[test]
    fn test_wrong_segment_count() {
        assert!(validate("not-a-jwt").is_err());
        assert!(validate("a.b").is_err());
        assert!(validate("a.b.c.d").is_err());
    }

    #[test]
    fn test_empty_segment() {
        let token = make_test_token(None);
        let parts: Vec<&str> = token.split('.').collect();
        assert!(validate(&format!("{}.{}.", parts[0], parts[1])).is_err());
    }

    #[test]
    fn test_payload_not_object() {
        let header = URL_SAFE_LENIENT.encode(b"{}");
        let payload = URL_SAFE_LENIENT.encode(b"[1,2,3]");
        let token = format!("{}.{}.c2ln", header, payload);
        let err = validate(&token).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn test_payload_not_base64() {
        assert!(validate("aGVhZA.!!!.c2ln").is_err());
    }

    #[test]
    fn test_non_numeric_exp() {
        let header = URL_SAFE_LENIENT.encode(b"{}");
        let payload = URL_SAFE_LENIENT.encode(br#"{"exp":"tomorrow"}"#);
        let token = format!("{}.{}.c2ln", header, payload);
        assert!(validate(&token).is_err());
    }

    #[test]
    fn test_padded_segments_accepted() {
        let header = base64::engine::general_purpose::URL_SAFE.encode(b"{\"a\":1}");
        let payload = base64::engine::general_purpose::URL_SAFE.encode(b"{\"sub\":\"x\"}");
        let token = format!("{}.{}.c2ln", header, payload);
        assert_eq!(validate(&token).unwrap(), None);
    }
}
