use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::models::Principal;
use crate::payments::{is_checkout_session_id, parse_event, PaymentError, SIGNATURE_HEADER};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub session_id: Option<String>,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<VerifyParams>,
) -> Result<Response, AppError> {
    let session_id = params
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing session_id".to_string()))?;
    if !is_checkout_session_id(&session_id) {
        return Err(AppError::ValidationError("Invalid session_id".to_string()));
    }

    let verification = state
        .verification()
        .verify(&session_id, &principal)
        .await?;
    let message = verification.message();
    Ok(success(verification, message))
}

/// Receives the processor's signed event deliveries.
///
/// Anything that fails verification is refused before the store is touched.
/// Once verified the delivery is always acknowledged, even when applying it
/// fails, so the processor does not retry into the same failure.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::PaymentProviderError(PaymentError::InvalidSignature(
                "missing signature header".to_string(),
            ))
        })?;

    state.webhooks.verify(&body, signature)?;

    match parse_event(&body) {
        Ok(event) => match state.settlement().apply(event).await {
            Ok(outcome) => info!(outcome = ?outcome, "Webhook applied"),
            Err(e) => error!(error = %e, "Failed to apply webhook"),
        },
        Err(e) => error!(error = %e, "Verified webhook payload could not be decoded"),
    }

    Ok(Json(json!({ "received": true })))
}
