//! Payment notification verification and decoding.
//!
//! The gateway signs every notification with a header of the form
//! `t=<unix seconds>,v1=<hex hmac>` where the HMAC-SHA256 covers
//! `"<t>.<raw body>"`. Several `v1` entries may appear while a secret is
//! being rotated; any one of them matching is enough.

use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::ErrorKind;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Name of the HTTP header carrying the signature.
pub const SIGNATURE_HEADER: &str = "payment-signature";

/// Errors raised while verifying or decoding a notification.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing payment signature")]
    MissingSignature,

    #[error("Invalid signature header: {0}")]
    InvalidSignatureHeader(String),

    #[error("Signature does not match")]
    SignatureMismatch,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutsideTolerance,

    #[error("Unsigned notifications are not allowed")]
    UnsignedNotAllowed,

    #[error("Malformed notification payload: {0}")]
    MalformedPayload(String),
}

impl WebhookError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WebhookError::MalformedPayload(_) => ErrorKind::InvalidArgument,
            _ => ErrorKind::Unauthenticated,
        }
    }
}

/// Webhook verification settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared signing secret. When set, every notification must be signed.
    pub secret: Option<String>,

    /// Accept unsigned notifications when no secret is configured.
    pub allow_unsigned: bool,

    /// Production never accepts unsigned notifications.
    pub production: bool,

    /// Maximum age of a signature timestamp.
    pub tolerance: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            allow_unsigned: false,
            production: true,
            tolerance: Duration::from_secs(300),
        }
    }
}

impl WebhookConfig {
    /// Creates a config that requires signatures made with `secret`.
    pub fn signed(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Returns true if unsigned notifications would be accepted.
    pub fn unsigned_mode(&self) -> bool {
        self.secret.is_none() && self.allow_unsigned && !self.production
    }
}

/// Kind of payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEventKind {
    PaymentSucceeded,
    PaymentFailed,
    Other(String),
}

impl PaymentEventKind {
    fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => PaymentEventKind::PaymentSucceeded,
            "payment_intent.payment_failed" => PaymentEventKind::PaymentFailed,
            other => PaymentEventKind::Other(other.to_string()),
        }
    }

    /// Returns a short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentEventKind::PaymentSucceeded => "succeeded",
            PaymentEventKind::PaymentFailed => "payment_failed",
            PaymentEventKind::Other(_) => "other",
        }
    }
}

/// A verified payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub id: String,
    pub kind: PaymentEventKind,
    pub authorization_id: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawData {
    object: RawObject,
}

#[derive(Deserialize)]
struct RawObject {
    id: Option<String>,
}

/// Verifies and decodes payment notifications.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    config: WebhookConfig,
}

impl WebhookVerifier {
    /// Creates a verifier with the given settings.
    pub fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    /// Returns the verifier settings.
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Verifies `signature` against `body` and decodes the event.
    pub fn decode(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<PaymentEvent, WebhookError> {
        self.decode_at(body, signature, Utc::now())
    }

    /// Same as [`WebhookVerifier::decode`] with an explicit current time.
    pub fn decode_at(
        &self,
        body: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PaymentEvent, WebhookError> {
        match &self.config.secret {
            Some(secret) => {
                let header = signature.ok_or(WebhookError::MissingSignature)?;
                self.verify(secret, header, body, now)?;
            }
            None if self.config.unsigned_mode() => {
                tracing::warn!("accepting unsigned payment notification");
            }
            None => return Err(WebhookError::UnsignedNotAllowed),
        }

        parse_event(body)
    }

    fn verify(
        &self,
        secret: &str,
        header: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let parsed = SignatureHeader::parse(header)?;

        let age = now.timestamp().abs_diff(parsed.timestamp);
        if age > self.config.tolerance.as_secs() {
            return Err(WebhookError::TimestampOutsideTolerance);
        }

        let matched = parsed.signatures.iter().any(|candidate| {
            let Ok(expected) = hex::decode(candidate) else {
                return false;
            };
            signed_mac(secret, parsed.timestamp, body)
                .map(|mac| mac.verify_slice(&expected).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(WebhookError::SignatureMismatch)
        }
    }
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        WebhookError::InvalidSignatureHeader(format!("bad timestamp {value:?}"))
                    })?);
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::InvalidSignatureHeader("missing t".to_string()))?;
        if signatures.is_empty() {
            return Err(WebhookError::InvalidSignatureHeader("missing v1".to_string()));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

fn signed_mac(secret: &str, timestamp: i64, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(mac)
}

/// Builds a signature header for `body`, as the gateway would.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let digest = signed_mac(secret, timestamp, body)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("t={timestamp},v1={digest}")
}

fn parse_event(body: &[u8]) -> Result<PaymentEvent, WebhookError> {
    let raw: RawEvent =
        serde_json::from_slice(body).map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    Ok(PaymentEvent {
        id: raw.id,
        kind: PaymentEventKind::from_type(&raw.event_type),
        authorization_id: raw.data.and_then(|data| data.object.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] =
        br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_000001"}}}"#;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_valid_signature_decodes() {
        let verifier = WebhookVerifier::new(WebhookConfig::signed(SECRET));
        let header = sign(SECRET, now().timestamp(), BODY);

        let event = verifier.decode_at(BODY, Some(&header), now()).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.kind, PaymentEventKind::PaymentSucceeded);
        assert_eq!(event.authorization_id.as_deref(), Some("pi_000001"));
    }

    #[test]
    fn test_any_rotated_signature_may_match() {
        let verifier = WebhookVerifier::new(WebhookConfig::signed(SECRET));
        let good = sign(SECRET, now().timestamp(), BODY);
        let good_v1 = good.split_once(",v1=").unwrap().1;
        let header = format!("t={},v1=deadbeef,v1={good_v1}", now().timestamp());

        assert!(verifier.decode_at(BODY, Some(&header), now()).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let verifier = WebhookVerifier::new(WebhookConfig::signed(SECRET));
        let header = sign(SECRET, now().timestamp(), BODY);
        let tampered = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_000002"}}}"#;

        let err = verifier
            .decode_at(tampered, Some(&header), now())
            .unwrap_err();
        assert!(matches!(err, WebhookError::SignatureMismatch));
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let verifier = WebhookVerifier::new(WebhookConfig::signed(SECRET));
        let header = sign("whsec_other", now().timestamp(), BODY);

        assert!(matches!(
            verifier.decode_at(BODY, Some(&header), now()),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let verifier = WebhookVerifier::new(WebhookConfig::signed(SECRET));
        let stale = now().timestamp() - 301;
        let header = sign(SECRET, stale, BODY);

        assert!(matches!(
            verifier.decode_at(BODY, Some(&header), now()),
            Err(WebhookError::TimestampOutsideTolerance)
        ));
    }

    #[test]
    fn test_missing_or_garbled_header() {
        let verifier = WebhookVerifier::new(WebhookConfig::signed(SECRET));

        assert!(matches!(
            verifier.decode_at(BODY, None, now()),
            Err(WebhookError::MissingSignature)
        ));
        assert!(matches!(
            verifier.decode_at(BODY, Some("v1=abc"), now()),
            Err(WebhookError::InvalidSignatureHeader(_))
        ));
        assert!(matches!(
            verifier.decode_at(BODY, Some("t=abc,v1=abc"), now()),
            Err(WebhookError::InvalidSignatureHeader(_))
        ));
    }

    #[test]
    fn test_unsigned_mode_requires_every_condition() {
        let dev_unsigned = WebhookConfig {
            secret: None,
            allow_unsigned: true,
            production: false,
            ..WebhookConfig::default()
        };
        assert!(dev_unsigned.unsigned_mode());
        let event = WebhookVerifier::new(dev_unsigned.clone())
            .decode_at(BODY, None, now())
            .unwrap();
        assert_eq!(event.kind, PaymentEventKind::PaymentSucceeded);

        let production = WebhookConfig {
            production: true,
            ..dev_unsigned.clone()
        };
        assert!(matches!(
            WebhookVerifier::new(production).decode_at(BODY, None, now()),
            Err(WebhookError::UnsignedNotAllowed)
        ));

        let not_allowed = WebhookConfig {
            allow_unsigned: false,
            ..dev_unsigned.clone()
        };
        assert!(matches!(
            WebhookVerifier::new(not_allowed).decode_at(BODY, None, now()),
            Err(WebhookError::UnsignedNotAllowed)
        ));
    }

    #[test]
    fn test_secret_makes_unsigned_mode_unreachable() {
        let config = WebhookConfig {
            secret: Some(SECRET.to_string()),
            allow_unsigned: true,
            production: false,
            ..WebhookConfig::default()
        };
        assert!(!config.unsigned_mode());

        let err = WebhookVerifier::new(config)
            .decode_at(BODY, None, now())
            .unwrap_err();
        assert!(matches!(err, WebhookError::MissingSignature));
    }

    #[test]
    fn test_malformed_payload() {
        let verifier = WebhookVerifier::new(WebhookConfig::signed(SECRET));
        let body = b"not json";
        let header = sign(SECRET, now().timestamp(), body);

        let err = verifier.decode_at(body, Some(&header), now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unknown_type_and_missing_data() {
        let verifier = WebhookVerifier::new(WebhookConfig::signed(SECRET));
        let body = br#"{"id":"evt_9","type":"charge.dispute.created"}"#;
        let header = sign(SECRET, now().timestamp(), body);

        let event = verifier.decode_at(body, Some(&header), now()).unwrap();
        assert_eq!(
            event.kind,
            PaymentEventKind::Other("charge.dispute.created".to_string())
        );
        assert_eq!(event.kind.label(), "other");
        assert!(event.authorization_id.is_none());
    }
}
