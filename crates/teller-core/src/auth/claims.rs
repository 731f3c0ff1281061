//! Claims extraction from access tokens.
//!
//! Access tokens are JWS compact strings (`header.payload.signature`). The
//! client never holds the signing key, so the default decoder reads the
//! payload without checking the signature; trust comes from the issuing
//! server. A verifying decoder can be substituted through [`ClaimsDecoder`].

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::SessionError;

/// Read-only view of the claims the session core relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.time_until_expiry(now).num_minutes().max(0)
    }
}

/// Turns an access token into [`Claims`].
pub trait ClaimsDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Result<Claims, SessionError>;
}

/// Decodes the payload segment without verifying the signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedDecoder;

/// The customer API issues `customerId` as either a string or a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectValue {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(rename = "customerId")]
    customer_id: Option<SubjectValue>,
    sub: Option<String>,
    exp: Option<f64>,
}

impl ClaimsDecoder for UnverifiedDecoder {
    fn decode(&self, token: &str) -> Result<Claims, SessionError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(SessionError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(segments[1].trim_end_matches('='))
            .map_err(|e| SessionError::MalformedToken(format!("payload is not base64url: {}", e)))?;

        let raw: RawClaims = serde_json::from_slice(&payload)
            .map_err(|e| SessionError::MalformedToken(format!("payload is not a claims object: {}", e)))?;

        let subject_id = match raw.customer_id {
            Some(SubjectValue::Text(id)) => id,
            Some(SubjectValue::Number(id)) => id.to_string(),
            None => raw.sub.unwrap_or_default(),
        };
        if subject_id.is_empty() {
            return Err(SessionError::MalformedToken("missing subject claim".to_string()));
        }

        let exp = raw
            .exp
            .filter(|exp| exp.is_finite())
            .ok_or_else(|| SessionError::MalformedToken("missing exp claim".to_string()))?;
        let expires_at = DateTime::from_timestamp(exp.floor() as i64, 0)
            .ok_or_else(|| SessionError::MalformedToken(format!("exp out of range: {}", exp)))?;

        Ok(Claims {
            subject_id,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{encode_segment, make_token};
    use chrono::TimeZone;

    #[test]
    fn test_decode_customer_id_and_exp() {
        let expires_at = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let token = make_token("cust-42", expires_at);

        let claims = UnverifiedDecoder.decode(&token).unwrap();
        assert_eq!(claims.subject_id, "cust-42");
        assert_eq!(claims.expires_at, expires_at);
    }

    #[test]
    fn test_decode_numeric_customer_id() {
        let payload = encode_segment(r#"{"customerId": 1017, "exp": 1900000000}"#);
        let token = format!("{}.{}.sig", encode_segment(r#"{"alg":"HS256"}"#), payload);

        let claims = UnverifiedDecoder.decode(&token).unwrap();
        assert_eq!(claims.subject_id, "1017");
    }

    #[test]
    fn test_decode_falls_back_to_sub() {
        let payload = encode_segment(r#"{"sub": "user-7", "exp": 1900000000}"#);
        let token = format!("h.{}.s", payload);

        let claims = UnverifiedDecoder.decode(&token).unwrap();
        assert_eq!(claims.subject_id, "user-7");
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let payload = format!("{}==", encode_segment(r#"{"sub":"a","exp":1900000000}"#));
        let token = format!("h.{}.s", payload);
        assert!(UnverifiedDecoder.decode(&token).is_ok());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases = [
            String::new(),
            "not-a-token".to_string(),
            "a.b".to_string(),
            "a.!!!.c".to_string(),
            format!("h.{}.s", encode_segment(r#""just a string""#)),
            format!("h.{}.s", encode_segment(r#"{"customerId": "x"}"#)),
            format!("h.{}.s", encode_segment(r#"{"exp": 1900000000}"#)),
        ];
        for token in cases {
            assert!(
                matches!(UnverifiedDecoder.decode(&token), Err(SessionError::MalformedToken(_))),
                "expected MalformedToken for {:?}",
                token
            );
        }
    }

    #[test]
    fn test_minutes_until_expiry() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let claims = Claims {
            subject_id: "c".to_string(),
            expires_at: now + Duration::minutes(12),
        };
        assert_eq!(claims.minutes_until_expiry(now), 12);
        // Already expired clamps to zero
        assert_eq!(claims.minutes_until_expiry(now + Duration::hours(1)), 0);
    }
}
