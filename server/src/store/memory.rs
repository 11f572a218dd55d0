use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BookingStore, StoreError, StoreResult};
use crate::models::{
    Booking, BookingLineItem, BookingStatus, BookingWithLines, Event, EventChanges, NewBooking,
    NewEvent, NewTicketType, TicketType, TicketTypeChanges,
};

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    bookings: HashMap<Uuid, Booking>,
    booking_tickets: Vec<BookingLineItem>,
}

impl Tables {
    fn lines_for(&self, booking_id: Uuid) -> Vec<BookingLineItem> {
        self.booking_tickets
            .iter()
            .filter(|line| line.booking_id == booking_id)
            .cloned()
            .collect()
    }
}

/// Switches that make individual store calls fail, for exercising the
/// compensation and logging paths.
#[derive(Default)]
pub struct FailPoints {
    pub fetch_ticket_types: AtomicBool,
    pub insert_booking: AtomicBool,
    pub set_session_id: AtomicBool,
    pub commit_inventory: AtomicBool,
}

fn tripped(flag: &AtomicBool, operation: &str) -> StoreResult<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(StoreError::Unavailable(format!("{} failed", operation)));
    }
    Ok(())
}

/// A [`BookingStore`] held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    pub fail: FailPoints,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_event(&self, title: &str) -> Event {
        self.insert_event(NewEvent {
            title: title.to_string(),
            description: None,
            location: None,
            starts_at: Utc::now(),
            ends_at: None,
            images: Vec::new(),
        })
        .await
    }

    async fn insert_event(&self, new: NewEvent) -> Event {
        let event = Event {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            location: new.location,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            images: new.images,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .events
            .insert(event.id, event.clone());
        event
    }

    pub async fn seed_ticket_type(
        &self,
        event_id: Uuid,
        name: &str,
        price: Decimal,
        total_tickets: i32,
    ) -> TicketType {
        let ticket_type = TicketType {
            id: Uuid::new_v4(),
            event_id,
            name: name.to_string(),
            price,
            total_tickets,
            available_tickets: total_tickets,
            booked_tickets: 0,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .ticket_types
            .insert(ticket_type.id, ticket_type.clone());
        ticket_type
    }

    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn fetch_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.tables.read().await.events.get(&event_id).cloned())
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Event> = tables.events.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn create_event(&self, new: NewEvent) -> StoreResult<Event> {
        Ok(self.insert_event(new).await)
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>> {
        let mut tables = self.tables.write().await;
        let Some(event) = tables.events.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(event);
        Ok(Some(event.clone()))
    }

    async fn event_in_use(&self, id: Uuid) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .any(|b| b.event_id == id && b.status != BookingStatus::Cancelled))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.events.remove(&id).is_none() {
            return Ok(false);
        }
        tables.ticket_types.retain(|_, tt| tt.event_id != id);
        let dropped: Vec<Uuid> = tables
            .bookings
            .values()
            .filter(|b| b.event_id == id)
            .map(|b| b.id)
            .collect();
        tables.bookings.retain(|_, b| b.event_id != id);
        tables
            .booking_tickets
            .retain(|line| !dropped.contains(&line.booking_id));
        Ok(true)
    }

    async fn fetch_ticket_types(
        &self,
        event_id: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<Vec<TicketType>> {
        tripped(&self.fail.fetch_ticket_types, "fetch_ticket_types")?;
        let tables = self.tables.read().await;
        Ok(tables
            .ticket_types
            .values()
            .filter(|tt| tt.event_id == event_id && ids.contains(&tt.id))
            .cloned()
            .collect())
    }

    async fn list_ticket_types(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<TicketType> = tables
            .ticket_types
            .values()
            .filter(|tt| tt.event_id == event_id)
            .cloned()
            .collect();
        rows.sort_by_key(|tt| tt.created_at);
        Ok(rows)
    }

    async fn get_ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        Ok(self.tables.read().await.ticket_types.get(&id).cloned())
    }

    async fn create_ticket_type(
        &self,
        event_id: Uuid,
        new: NewTicketType,
    ) -> StoreResult<TicketType> {
        Ok(self
            .seed_ticket_type(event_id, &new.name, new.price, new.total_tickets)
            .await)
    }

    async fn update_ticket_type(
        &self,
        id: Uuid,
        changes: TicketTypeChanges,
    ) -> StoreResult<Option<TicketType>> {
        let mut tables = self.tables.write().await;
        let Some(ticket_type) = tables.ticket_types.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            ticket_type.name = name;
        }
        if let Some(price) = changes.price {
            ticket_type.price = price;
        }
        Ok(Some(ticket_type.clone()))
    }

    async fn ticket_type_in_use(&self, id: Uuid) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.booking_tickets.iter().any(|line| {
            line.ticket_type_id == id
                && tables
                    .bookings
                    .get(&line.booking_id)
                    .is_some_and(|b| b.status != BookingStatus::Cancelled)
        }))
    }

    async fn delete_ticket_type(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.ticket_types.remove(&id).is_some();
        tables.booking_tickets.retain(|line| line.ticket_type_id != id);
        Ok(removed)
    }

    async fn insert_booking(&self, new: NewBooking) -> StoreResult<BookingWithLines> {
        tripped(&self.fail.insert_booking, "insert_booking")?;
        let booking = Booking {
            id: Uuid::new_v4(),
            event_id: new.event_id,
            user_id: new.user_id,
            customer_name: new.customer_name,
            customer_email: new.customer_email,
            customer_phone: new.customer_phone,
            total_amount: new.total_amount,
            status: new.status,
            stripe_session_id: None,
            payment_intent_id: None,
            created_at: Utc::now(),
        };
        let tickets: Vec<BookingLineItem> = new
            .lines
            .iter()
            .map(|line| BookingLineItem {
                id: Uuid::new_v4(),
                booking_id: booking.id,
                ticket_type_id: line.ticket_type_id,
                quantity: line.quantity,
                price_per_ticket: line.price_per_ticket,
                subtotal: line.subtotal(),
            })
            .collect();

        let mut tables = self.tables.write().await;
        tables.bookings.insert(booking.id, booking.clone());
        tables.booking_tickets.extend(tickets.iter().cloned());

        Ok(BookingWithLines { booking, tickets })
    }

    async fn delete_booking(&self, booking_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.bookings.remove(&booking_id);
        tables
            .booking_tickets
            .retain(|line| line.booking_id != booking_id);
        Ok(())
    }

    async fn set_session_id(&self, booking_id: Uuid, session_id: &str) -> StoreResult<()> {
        tripped(&self.fail.set_session_id, "set_session_id")?;
        if let Some(booking) = self.tables.write().await.bookings.get_mut(&booking_id) {
            booking.stripe_session_id = Some(session_id.to_string());
        }
        Ok(())
    }

    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<BookingWithLines>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .find(|b| b.stripe_session_id.as_deref() == Some(session_id))
            .map(|booking| BookingWithLines {
                booking: booking.clone(),
                tickets: tables.lines_for(booking.id),
            }))
    }

    async fn find_by_session_for_user(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> StoreResult<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .find(|b| b.stripe_session_id.as_deref() == Some(session_id) && b.user_id == user_id)
            .cloned())
    }

    async fn mark_confirmed(&self, booking_id: Uuid, payment_intent_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.bookings.get_mut(&booking_id) {
            Some(booking) if booking.status == BookingStatus::Pending => {
                booking.status = BookingStatus::Confirmed;
                booking.payment_intent_id = Some(payment_intent_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_cancelled(&self, booking_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.bookings.get_mut(&booking_id) {
            Some(booking) if booking.status == BookingStatus::Pending => {
                booking.status = BookingStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_inventory(&self, ticket_type_id: Uuid, quantity: i32) -> StoreResult<bool> {
        tripped(&self.fail.commit_inventory, "commit_inventory")?;
        let mut tables = self.tables.write().await;
        match tables.ticket_types.get_mut(&ticket_type_id) {
            Some(tt) if tt.available_tickets >= quantity => {
                tt.available_tickets -= quantity;
                tt.booked_tickets += quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_booking(&self, booking_id: Uuid) -> StoreResult<Option<BookingWithLines>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .get(&booking_id)
            .map(|booking| BookingWithLines {
                booking: booking.clone(),
                tickets: tables.lines_for(booking.id),
            }))
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id && status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_all_bookings(&self) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Booking> = tables.bookings.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_inventory_is_conditional() {
        let store = MemoryStore::new();
        let event = store.seed_event("Gala").await;
        let tt = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 2)
            .await;

        assert!(store.commit_inventory(tt.id, 2).await.unwrap());
        assert!(!store.commit_inventory(tt.id, 1).await.unwrap());

        let after = store.get_ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(after.available_tickets, 0);
        assert_eq!(after.booked_tickets, 2);
        assert!(after.is_balanced());
    }

    #[tokio::test]
    async fn test_delete_event_cascades() {
        let store = MemoryStore::new();
        let gala = store.seed_event("Gala").await;
        let expo = store.seed_event("Expo").await;
        let gala_tt = store
            .seed_ticket_type(gala.id, "GA", Decimal::new(1000, 2), 10)
            .await;
        let expo_tt = store
            .seed_ticket_type(expo.id, "GA", Decimal::new(1000, 2), 10)
            .await;

        assert!(store.delete_event(gala.id).await.unwrap());
        assert!(!store.delete_event(gala.id).await.unwrap());
        assert!(store.get_ticket_type(gala_tt.id).await.unwrap().is_none());
        assert!(store.get_ticket_type(expo_tt.id).await.unwrap().is_some());
        assert_eq!(store.list_events().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_ticket_types_is_scoped_to_event() {
        let store = MemoryStore::new();
        let gala = store.seed_event("Gala").await;
        let expo = store.seed_event("Expo").await;
        let gala_tt = store
            .seed_ticket_type(gala.id, "GA", Decimal::new(1000, 2), 10)
            .await;
        let expo_tt = store
            .seed_ticket_type(expo.id, "GA", Decimal::new(1000, 2), 10)
            .await;

        let rows = store
            .fetch_ticket_types(gala.id, &[gala_tt.id, expo_tt.id])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, gala_tt.id);
    }
}
