use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BookingStore, StoreResult};
use crate::models::{
    Booking, BookingLineItem, BookingStatus, BookingWithLines, Event, EventChanges, NewBooking,
    NewEvent, NewTicketType, TicketType, TicketTypeChanges,
};

const BOOKING_COLUMNS: &str = "id, event_id, user_id, customer_name, customer_email, \
     customer_phone, total_amount, status, stripe_session_id, payment_intent_id, created_at";

const EVENT_COLUMNS: &str =
    "id, title, description, location, starts_at, ends_at, images, created_at";

const TICKET_TYPE_COLUMNS: &str =
    "id, event_id, name, price, total_tickets, available_tickets, booked_tickets, created_at";

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lines_for(&self, booking_id: Uuid) -> StoreResult<Vec<BookingLineItem>> {
        let lines = sqlx::query_as::<_, BookingLineItem>(
            "SELECT id, booking_id, ticket_type_id, quantity, price_per_ticket, subtotal \
             FROM booking_tickets WHERE booking_id = $1 ORDER BY id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn with_lines(&self, booking: Option<Booking>) -> StoreResult<Option<BookingWithLines>> {
        match booking {
            Some(booking) => {
                let tickets = self.lines_for(booking.id).await?;
                Ok(Some(BookingWithLines { booking, tickets }))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn fetch_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, Event>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create_event(&self, new: NewEvent) -> StoreResult<Event> {
        let sql = format!(
            "INSERT INTO events \
             (id, title, description, location, starts_at, ends_at, images, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {EVENT_COLUMNS}"
        );
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.location)
            .bind(new.starts_at)
            .bind(new.ends_at)
            .bind(&new.images)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>> {
        let sql = format!(
            "UPDATE events SET \
                 title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 location = COALESCE($4, location), \
                 starts_at = COALESCE($5, starts_at), \
                 ends_at = COALESCE($6, ends_at), \
                 images = COALESCE($7, images) \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        );
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.location)
            .bind(changes.starts_at)
            .bind(changes.ends_at)
            .bind(changes.images)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn event_in_use(&self, id: Uuid) -> StoreResult<bool> {
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM bookings WHERE event_id = $1 AND status <> 'cancelled')",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(in_use)
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        // Foreign keys cascade to ticket types, bookings and their lines.
        let result = sqlx::query(
            "DELETE FROM events WHERE id = $1 AND NOT EXISTS ( \
                SELECT 1 FROM bookings WHERE event_id = $1 AND status <> 'cancelled')",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_ticket_types(
        &self,
        event_id: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<Vec<TicketType>> {
        let sql = format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM events_ticket_types \
             WHERE id = ANY($1) AND event_id = $2"
        );
        let rows = sqlx::query_as::<_, TicketType>(&sql)
            .bind(ids)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_ticket_types(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>> {
        let sql = format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM events_ticket_types \
             WHERE event_id = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, TicketType>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        let sql = format!("SELECT {TICKET_TYPE_COLUMNS} FROM events_ticket_types WHERE id = $1");
        let row = sqlx::query_as::<_, TicketType>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_ticket_type(
        &self,
        event_id: Uuid,
        new: NewTicketType,
    ) -> StoreResult<TicketType> {
        let sql = format!(
            "INSERT INTO events_ticket_types \
             (id, event_id, name, price, total_tickets, available_tickets, booked_tickets, created_at) \
             VALUES ($1, $2, $3, $4, $5, $5, 0, $6) RETURNING {TICKET_TYPE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TicketType>(&sql)
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(&new.name)
            .bind(new.price)
            .bind(new.total_tickets)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_ticket_type(
        &self,
        id: Uuid,
        changes: TicketTypeChanges,
    ) -> StoreResult<Option<TicketType>> {
        let sql = format!(
            "UPDATE events_ticket_types \
             SET name = COALESCE($2, name), price = COALESCE($3, price) \
             WHERE id = $1 RETURNING {TICKET_TYPE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TicketType>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.price)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn ticket_type_in_use(&self, id: Uuid) -> StoreResult<bool> {
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM booking_tickets bt \
                JOIN bookings b ON b.id = bt.booking_id \
                WHERE bt.ticket_type_id = $1 AND b.status <> 'cancelled')",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(in_use)
    }

    async fn delete_ticket_type(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events_ticket_types WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_booking(&self, new: NewBooking) -> StoreResult<BookingWithLines> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO bookings \
             (id, event_id, user_id, customer_name, customer_email, customer_phone, \
              total_amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {BOOKING_COLUMNS}"
        );
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.event_id)
            .bind(new.user_id)
            .bind(&new.customer_name)
            .bind(&new.customer_email)
            .bind(&new.customer_phone)
            .bind(new.total_amount)
            .bind(new.status)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        let mut tickets = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let item = sqlx::query_as::<_, BookingLineItem>(
                "INSERT INTO booking_tickets \
                 (id, booking_id, ticket_type_id, quantity, price_per_ticket, subtotal) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING id, booking_id, ticket_type_id, quantity, price_per_ticket, subtotal",
            )
            .bind(Uuid::new_v4())
            .bind(booking.id)
            .bind(line.ticket_type_id)
            .bind(line.quantity)
            .bind(line.price_per_ticket)
            .bind(line.subtotal())
            .fetch_one(&mut *tx)
            .await?;
            tickets.push(item);
        }

        tx.commit().await?;

        Ok(BookingWithLines { booking, tickets })
    }

    async fn delete_booking(&self, booking_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_session_id(&self, booking_id: Uuid, session_id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE bookings SET stripe_session_id = $2 WHERE id = $1")
            .bind(booking_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<BookingWithLines>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE stripe_session_id = $1");
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        self.with_lines(booking).await
    }

    async fn find_by_session_for_user(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE stripe_session_id = $1 AND user_id = $2"
        );
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn mark_confirmed(&self, booking_id: Uuid, payment_intent_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'confirmed', payment_intent_id = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(booking_id)
        .bind(payment_intent_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_cancelled(&self, booking_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'cancelled' WHERE id = $1 AND status = 'pending'",
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit_inventory(&self, ticket_type_id: Uuid, quantity: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE events_ticket_types \
             SET available_tickets = available_tickets - $2, \
                 booked_tickets = booked_tickets + $2 \
             WHERE id = $1 AND available_tickets >= $2",
        )
        .bind(ticket_type_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<BookingWithLines>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;
        self.with_lines(booking).await
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE user_id = $1 AND ($2::booking_status IS NULL OR status = $2) \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, Booking>(&sql)
            .bind(user_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_all_bookings(&self) -> StoreResult<Vec<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, Booking>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
