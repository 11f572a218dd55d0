//! Data access for the four tables the booking workflow touches:
//! `events`, `events_ticket_types`, `bookings` and `booking_tickets`.
//!
//! Handlers and services only see [`BookingStore`]; Postgres backs it in
//! production and [`MemoryStore`] backs it in tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, BookingWithLines, Event, EventChanges, NewBooking, NewEvent,
    NewTicketType, TicketType, TicketTypeChanges,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgBookingStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn fetch_event(&self, event_id: Uuid) -> StoreResult<Option<Event>>;

    /// Newest first.
    async fn list_events(&self) -> StoreResult<Vec<Event>>;

    async fn create_event(&self, new: NewEvent) -> StoreResult<Event>;

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>>;

    /// True while any non-cancelled booking exists for the event.
    async fn event_in_use(&self, id: Uuid) -> StoreResult<bool>;

    /// Removes the event together with its ticket types and any cancelled
    /// bookings against it.
    async fn delete_event(&self, id: Uuid) -> StoreResult<bool>;

    /// Batch lookup of ticket types, restricted to those belonging to `event_id`.
    async fn fetch_ticket_types(
        &self,
        event_id: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<Vec<TicketType>>;

    async fn list_ticket_types(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>>;

    async fn get_ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>>;

    /// Inserts a ticket type with `available_tickets = total_tickets` and no
    /// bookings against it.
    async fn create_ticket_type(
        &self,
        event_id: Uuid,
        new: NewTicketType,
    ) -> StoreResult<TicketType>;

    async fn update_ticket_type(
        &self,
        id: Uuid,
        changes: TicketTypeChanges,
    ) -> StoreResult<Option<TicketType>>;

    /// True while any non-cancelled booking has a line for this ticket type.
    async fn ticket_type_in_use(&self, id: Uuid) -> StoreResult<bool>;

    async fn delete_ticket_type(&self, id: Uuid) -> StoreResult<bool>;

    /// Inserts the booking and all of its lines as one unit. Either everything
    /// is written or nothing is.
    async fn insert_booking(&self, new: NewBooking) -> StoreResult<BookingWithLines>;

    async fn delete_booking(&self, booking_id: Uuid) -> StoreResult<()>;

    async fn set_session_id(&self, booking_id: Uuid, session_id: &str) -> StoreResult<()>;

    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<BookingWithLines>>;

    async fn find_by_session_for_user(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> StoreResult<Option<Booking>>;

    /// Moves a booking from `pending` to `confirmed`. Returns `false` when the
    /// booking was not pending, in which case nothing is written.
    async fn mark_confirmed(&self, booking_id: Uuid, payment_intent_id: &str) -> StoreResult<bool>;

    /// Moves a booking from `pending` to `cancelled`. Returns `false` when the
    /// booking was not pending.
    async fn mark_cancelled(&self, booking_id: Uuid) -> StoreResult<bool>;

    /// Moves `quantity` tickets from available to booked in a single
    /// conditional update. Returns `false` when fewer than `quantity` tickets
    /// are available, leaving the counters untouched.
    async fn commit_inventory(&self, ticket_type_id: Uuid, quantity: i32) -> StoreResult<bool>;

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<BookingWithLines>>;

    /// Newest first.
    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>>;

    /// Newest first.
    async fn list_all_bookings(&self) -> StoreResult<Vec<Booking>>;
}
