use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::booking::{queries, CheckoutRequest};
use crate::models::{BookingStatus, Principal};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<String>,
}

impl BookingFilter {
    fn status(&self) -> Result<Option<BookingStatus>, AppError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<BookingStatus>()
                .map(Some)
                .map_err(AppError::ValidationError),
        }
    }
}

pub async fn create_booking(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CheckoutRequest>,
) -> Result<Response, AppError> {
    let booking = state
        .checkout()
        .create_direct_booking(&principal, request)
        .await?;
    Ok(created(booking, "Booking confirmed"))
}

pub async fn list_my_bookings(
    State(state): State<AppState>,
    principal: Principal,
    Query(filter): Query<BookingFilter>,
) -> Result<Response, AppError> {
    let bookings = queries::list_for_user(state.store.as_ref(), &principal, filter.status()?).await?;
    Ok(success(bookings, "Bookings retrieved"))
}

pub async fn get_my_booking(
    State(state): State<AppState>,
    principal: Principal,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let booking = queries::get_for_user(state.store.as_ref(), &principal, booking_id).await?;
    Ok(success(booking, "Booking retrieved"))
}

pub async fn list_all_bookings(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Response, AppError> {
    let bookings = queries::list_all(state.store.as_ref()).await?;
    Ok(success(bookings, "Bookings retrieved"))
}
