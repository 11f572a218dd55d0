//! Verification and decoding of the processor's signed webhook deliveries.
//!
//! The signature header has the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is HMAC-SHA256 over `"<t>.<raw body>"` keyed with the
//! endpoint secret. Any matching `v1` is accepted, so secrets can be rolled.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

use super::{PaymentError, PaymentStatus};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Deliveries signed further than this from the current time are refused.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), PaymentError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), PaymentError> {
        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            PaymentError::InvalidSignature("missing timestamp in signature header".to_string())
        })?;
        if signatures.is_empty() {
            return Err(PaymentError::InvalidSignature(
                "missing v1 signature in signature header".to_string(),
            ));
        }

        let within_tolerance = now
            .checked_sub(timestamp)
            .map(i64::unsigned_abs)
            .is_some_and(|skew| skew <= self.tolerance_secs.unsigned_abs());
        if !within_tolerance {
            warn!(timestamp, now, "Webhook timestamp outside tolerance");
            return Err(PaymentError::InvalidSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| PaymentError::InvalidSignature("unusable webhook secret".to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature(
                "no signature matches payload".to_string(),
            ))
        }
    }
}

/// The webhook events the settlement flow reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        session_id: String,
        payment_status: PaymentStatus,
        payment_intent_id: Option<String>,
    },
    CheckoutExpired {
        session_id: String,
    },
    PaymentFailed {
        payment_intent_id: String,
    },
    Unhandled {
        event_type: String,
    },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    fn into_id(self) -> String {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

#[derive(Deserialize)]
struct RawSession {
    id: String,
    payment_status: PaymentStatus,
    payment_intent: Option<Expandable>,
}

#[derive(Deserialize)]
struct RawObjectId {
    id: String,
}

/// Decodes a verified payload. Call only after [`WebhookVerifier::verify`].
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let raw: RawEvent = serde_json::from_slice(payload)?;

    let event = match raw.event_type.as_str() {
        "checkout.session.completed" => {
            let session: RawSession = serde_json::from_value(raw.data.object)?;
            WebhookEvent::CheckoutCompleted {
                session_id: session.id,
                payment_status: session.payment_status,
                payment_intent_id: session.payment_intent.map(Expandable::into_id),
            }
        }
        "checkout.session.expired" => {
            let session: RawObjectId = serde_json::from_value(raw.data.object)?;
            WebhookEvent::CheckoutExpired {
                session_id: session.id,
            }
        }
        "payment_intent.payment_failed" => {
            let intent: RawObjectId = serde_json::from_value(raw.data.object)?;
            WebhookEvent::PaymentFailed {
                payment_intent_id: intent.id,
            }
        }
        _ => WebhookEvent::Unhandled {
            event_type: raw.event_type,
        },
    };

    Ok(event)
}

/// Builds a signature header for `payload`. Used by tests and local tooling
/// that replays deliveries.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::InvalidSignature("unusable webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"checkout.session.expired"}"#;
        let header = sign(payload, SECRET, NOW).unwrap();
        let verifier = WebhookVerifier::new(SECRET);
        assert!(verifier.verify_at(payload, &header, NOW + 10).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"type":"checkout.session.expired"}"#;
        let header = sign(payload, "wrong_secret", NOW).unwrap();
        let verifier = WebhookVerifier::new(SECRET);
        assert!(verifier.verify_at(payload, &header, NOW).is_err());
    }

    #[test]
    fn test_modified_payload_rejected() {
        let header = sign(br#"{"amount":100}"#, SECRET, NOW).unwrap();
        let verifier = WebhookVerifier::new(SECRET);
        assert!(verifier
            .verify_at(br#"{"amount":999}"#, &header, NOW)
            .is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = sign(payload, SECRET, NOW - 301).unwrap();
        let verifier = WebhookVerifier::new(SECRET);
        assert!(verifier.verify_at(payload, &header, NOW).is_err());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        for t in [i64::MIN, i64::MAX, -NOW] {
            let header = format!("t={},v1=00", t);
            assert!(
                matches!(
                    verifier.verify_at(b"{}", &header, NOW),
                    Err(PaymentError::InvalidSignature(_))
                ),
                "timestamp {} should be rejected",
                t
            );
        }
        let signed = sign(b"{}", SECRET, i64::MIN).unwrap();
        assert!(verifier.verify_at(b"{}", &signed, NOW).is_err());
    }

    #[test]
    fn test_rolled_secret_any_v1_matches() {
        let payload = b"{}";
        let good = sign(payload, SECRET, NOW).unwrap();
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={},v1={},v1={}", NOW, "00ff", good_sig);
        let verifier = WebhookVerifier::new(SECRET);
        assert!(verifier.verify_at(payload, &header, NOW).is_ok());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        for header in ["", "garbage", "t=1700000000", "v1=abcd", "t=abc,v1=abcd"] {
            assert!(
                verifier.verify_at(b"{}", header, NOW).is_err(),
                "header '{}' should be rejected",
                header
            );
        }
    }

    #[test]
    fn test_parse_completed_session() {
        let payload = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "payment_intent": "pi_123",
                "metadata": {"booking_id": "x"}
            }}
        }"#;
        assert_eq!(
            parse_event(payload).unwrap(),
            WebhookEvent::CheckoutCompleted {
                session_id: "cs_test_1".to_string(),
                payment_status: PaymentStatus::Paid,
                payment_intent_id: Some("pi_123".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_expanded_payment_intent() {
        let payload = br#"{
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_2",
                "payment_status": "unpaid",
                "payment_intent": {"id": "pi_456", "status": "processing"}
            }}
        }"#;
        match parse_event(payload).unwrap() {
            WebhookEvent::CheckoutCompleted {
                payment_status,
                payment_intent_id,
                ..
            } => {
                assert_eq!(payment_status, PaymentStatus::Unpaid);
                assert_eq!(payment_intent_id.as_deref(), Some("pi_456"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_unhandled_type() {
        let payload = br#"{"type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
        assert_eq!(
            parse_event(payload).unwrap(),
            WebhookEvent::Unhandled {
                event_type: "customer.created".to_string()
            }
        );
    }
}
