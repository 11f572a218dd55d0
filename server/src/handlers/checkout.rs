use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::booking::CheckoutRequest;
use crate::models::Principal;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::created;

pub async fn create_checkout_session(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CheckoutRequest>,
) -> Result<Response, AppError> {
    let started = state
        .checkout()
        .create_checkout_session(&principal, request)
        .await?;
    Ok(created(started, "Checkout session created"))
}
