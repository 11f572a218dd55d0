//! The payment processor seam: hosted checkout sessions plus the signed
//! webhook feed that reports their outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod mock;
pub mod stripe;
pub mod webhook;

pub use mock::MockPaymentProvider;
pub use stripe::StripeClient;
pub use webhook::{parse_event, sign, WebhookEvent, WebhookVerifier, SIGNATURE_HEADER};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid payment provider request: {0}")]
    InvalidRequest(String),

    #[error("unexpected payment provider response: {0}")]
    InvalidResponse(String),

    #[error("webhook signature rejected: {0}")]
    InvalidSignature(String),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// One purchasable line on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Unit price in minor currency units.
    pub unit_amount: i64,
    pub quantity: i32,
    pub currency: String,
    pub image_url: Option<String>,
}

/// Identifiers echoed back on every webhook for the session, so outcomes can
/// be correlated without a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionMetadata {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    pub metadata: SessionMetadata,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub id: String,
    pub payment_status: PaymentStatus,
}

impl SessionStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Shape check for checkout session ids: `cs_` followed by ASCII letters,
/// digits or underscores.
pub fn is_checkout_session_id(id: &str) -> bool {
    id.strip_prefix("cs_").is_some_and(|rest| {
        !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_session(&self, request: SessionRequest)
        -> Result<CheckoutSession, PaymentError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError>;
}
