use uuid::Uuid;

use crate::models::{Booking, BookingStatus, BookingWithLines, Principal};
use crate::store::BookingStore;
use crate::utils::error::AppError;

pub async fn list_for_user(
    store: &dyn BookingStore,
    principal: &Principal,
    status: Option<BookingStatus>,
) -> Result<Vec<Booking>, AppError> {
    Ok(store
        .list_bookings_for_user(principal.user_id, status)
        .await?)
}

/// Returns the booking only to its owner; any other caller sees not-found.
pub async fn get_for_user(
    store: &dyn BookingStore,
    principal: &Principal,
    booking_id: Uuid,
) -> Result<BookingWithLines, AppError> {
    store
        .get_booking(booking_id)
        .await?
        .filter(|found| found.booking.user_id == principal.user_id)
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

pub async fn list_all(store: &dyn BookingStore) -> Result<Vec<Booking>, AppError> {
    Ok(store.list_all_bookings().await?)
}
