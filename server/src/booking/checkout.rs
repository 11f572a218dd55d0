use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::ledger::InventoryLedger;
use crate::config::Config;
use crate::models::{
    BookingStatus, BookingWithLines, Event, NewBooking, NewLineItem, Principal, TicketType,
};
use crate::payments::{CheckoutLineItem, PaymentProvider, SessionMetadata, SessionRequest};
use crate::store::BookingStore;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct TicketRequest {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub event_id: Uuid,
    pub tickets: Vec<TicketRequest>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    pub booking_id: Uuid,
    pub session_id: String,
    pub session_url: String,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct ValidatedLine {
    pub ticket_type: TicketType,
    pub quantity: i32,
}

impl ValidatedLine {
    fn to_new_line(&self) -> NewLineItem {
        NewLineItem {
            ticket_type_id: self.ticket_type.id,
            quantity: self.quantity,
            price_per_ticket: self.ticket_type.price,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub lines: Vec<ValidatedLine>,
    pub total_amount: Decimal,
}

/// Checks an order against a snapshot of the referenced ticket types.
///
/// Availability is compared against the snapshot only; nothing is held, so
/// concurrent orders for the last tickets can all pass. The conditional
/// commit in the ledger is what keeps counters from going negative.
pub async fn validate_order(
    store: &dyn BookingStore,
    event_id: Uuid,
    tickets: &[TicketRequest],
) -> Result<ValidatedOrder, AppError> {
    if tickets.is_empty() {
        return Err(AppError::ValidationError(
            "Please select at least one ticket.".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(tickets.len());
    if !tickets.iter().all(|t| seen.insert(t.ticket_type_id)) {
        return Err(AppError::ValidationError(
            "Each ticket type may appear only once per order.".to_string(),
        ));
    }

    let ids: Vec<Uuid> = tickets.iter().map(|t| t.ticket_type_id).collect();
    let ticket_types: HashMap<Uuid, TicketType> = store
        .fetch_ticket_types(event_id, &ids)
        .await
        .map_err(|e| {
            error!(event_id = %event_id, error = %e, "Failed to fetch ticket types");
            AppError::DatabaseError(e)
        })?
        .into_iter()
        .map(|tt| (tt.id, tt))
        .collect();

    if let Some(missing) = ids.iter().find(|id| !ticket_types.contains_key(id)) {
        return Err(AppError::NotFound(format!("Ticket type {} not found", missing)));
    }

    let mut total_amount = Decimal::ZERO;
    let mut lines = Vec::with_capacity(tickets.len());

    for ticket in tickets {
        let ticket_type = ticket_types.get(&ticket.ticket_type_id).ok_or_else(|| {
            AppError::NotFound(format!("Ticket type {} not found", ticket.ticket_type_id))
        })?;

        if ticket.quantity <= 0 {
            return Err(AppError::ValidationError(
                "Ticket quantity must be greater than 0.".to_string(),
            ));
        }

        if ticket.quantity > ticket_type.available_tickets {
            return Err(AppError::ValidationError(format!(
                "Insufficient tickets for {}. Available: {}",
                ticket_type.name,
                ticket_type.available_tickets.max(0)
            )));
        }

        total_amount += ticket_type.price * Decimal::from(ticket.quantity);
        lines.push(ValidatedLine {
            ticket_type: ticket_type.clone(),
            quantity: ticket.quantity,
        });
    }

    if total_amount <= Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Invalid booking amount.".to_string(),
        ));
    }

    Ok(ValidatedOrder {
        lines,
        total_amount,
    })
}

/// Converts a decimal price into integer minor units, rounding halves up.
pub fn to_minor_units(price: Decimal) -> Result<i64, AppError> {
    (price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::ValidationError(format!("Price {} is out of range.", price)))
}

fn validate_contact(request: &CheckoutRequest) -> Result<(), AppError> {
    if request.customer_name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Customer name is required.".to_string(),
        ));
    }
    let email = request.customer_email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::ValidationError(
            "A valid customer email is required.".to_string(),
        ));
    }
    Ok(())
}

fn new_booking(
    principal: &Principal,
    request: &CheckoutRequest,
    order: &ValidatedOrder,
    status: BookingStatus,
) -> NewBooking {
    NewBooking {
        event_id: request.event_id,
        user_id: principal.user_id,
        customer_name: request.customer_name.trim().to_string(),
        customer_email: request.customer_email.trim().to_string(),
        customer_phone: request
            .customer_phone
            .as_ref()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        total_amount: order.total_amount,
        status,
        lines: order.lines.iter().map(ValidatedLine::to_new_line).collect(),
    }
}

pub struct CheckoutOrchestrator<'a> {
    store: &'a dyn BookingStore,
    payments: &'a dyn PaymentProvider,
    config: &'a Config,
}

impl<'a> CheckoutOrchestrator<'a> {
    pub fn new(
        store: &'a dyn BookingStore,
        payments: &'a dyn PaymentProvider,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            payments,
            config,
        }
    }

    /// Writes a pending booking and opens a hosted payment session for it.
    /// Inventory is not touched until the payment is settled.
    pub async fn create_checkout_session(
        &self,
        principal: &Principal,
        request: CheckoutRequest,
    ) -> Result<CheckoutStarted, AppError> {
        validate_contact(&request)?;

        let (event, order) = tokio::join!(
            self.store.fetch_event(request.event_id),
            validate_order(self.store, request.event_id, &request.tickets),
        );
        let event = event?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", request.event_id)))?;
        let order = order?;
        let line_items = self.line_items(&event, &order)?;

        let booking = self
            .store
            .insert_booking(new_booking(principal, &request, &order, BookingStatus::Pending))
            .await
            .map_err(|e| {
                error!(event_id = %request.event_id, error = %e, "Failed to create pending booking");
                AppError::DatabaseError(e)
            })?
            .booking;

        let session_request = SessionRequest {
            line_items,
            success_url: self
                .config
                .absolute_url("/user/bookings?session_id={CHECKOUT_SESSION_ID}"),
            cancel_url: self
                .config
                .absolute_url(&format!("/user/events/{}", request.event_id)),
            customer_email: booking.customer_email.clone(),
            metadata: SessionMetadata {
                booking_id: booking.id,
                event_id: request.event_id,
                user_id: principal.user_id,
            },
            expires_at: Utc::now() + Duration::minutes(self.config.checkout_expiry_minutes),
        };

        let session = match self.payments.create_session(session_request).await {
            Ok(session) => session,
            Err(e) => {
                error!(booking_id = %booking.id, error = %e, "Failed to create payment session");
                self.discard_booking(booking.id).await;
                return Err(AppError::PaymentProviderError(e));
            }
        };

        if let Err(e) = self.store.set_session_id(booking.id, &session.id).await {
            // The webhook carries the session id on its own, so this is recoverable.
            warn!(
                booking_id = %booking.id,
                session_id = %session.id,
                error = %e,
                "Failed to store session id on booking"
            );
        }

        info!(
            booking_id = %booking.id,
            session_id = %session.id,
            total = %order.total_amount,
            "Checkout session created"
        );

        Ok(CheckoutStarted {
            booking_id: booking.id,
            session_id: session.id,
            session_url: session.url,
            total_amount: order.total_amount,
        })
    }

    /// Books tickets without a payment step: the booking is written as
    /// `confirmed` and inventory is committed straight away.
    pub async fn create_direct_booking(
        &self,
        principal: &Principal,
        request: CheckoutRequest,
    ) -> Result<BookingWithLines, AppError> {
        validate_contact(&request)?;
        let order = validate_order(self.store, request.event_id, &request.tickets).await?;

        let booking = self
            .store
            .insert_booking(new_booking(
                principal,
                &request,
                &order,
                BookingStatus::Confirmed,
            ))
            .await
            .map_err(|e| {
                error!(event_id = %request.event_id, error = %e, "Failed to create booking");
                AppError::DatabaseError(e)
            })?;

        // The booking is committed at this point; inventory problems are
        // logged by the ledger and left for reconciliation.
        InventoryLedger::new(self.store)
            .commit_lines(booking.booking.id, &booking.tickets)
            .await;

        info!(
            booking_id = %booking.booking.id,
            total = %booking.booking.total_amount,
            "Direct booking confirmed"
        );
        Ok(booking)
    }

    fn line_items(
        &self,
        event: &Event,
        order: &ValidatedOrder,
    ) -> Result<Vec<CheckoutLineItem>, AppError> {
        let image_url = event
            .images
            .first()
            .filter(|img| !img.trim().is_empty())
            .map(|img| self.config.absolute_url(img));

        order
            .lines
            .iter()
            .map(|line| {
                Ok(CheckoutLineItem {
                    name: format!("{} - {}", event.title, line.ticket_type.name),
                    unit_amount: to_minor_units(line.ticket_type.price)?,
                    quantity: line.quantity,
                    currency: self.config.currency.clone(),
                    image_url: image_url.clone(),
                })
            })
            .collect()
    }

    async fn discard_booking(&self, booking_id: Uuid) {
        if let Err(e) = self.store.delete_booking(booking_id).await {
            // Left pending without a session; it can never be confirmed.
            error!(booking_id = %booking_id, error = %e, "Failed to discard pending booking");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::payments::MockPaymentProvider;
    use crate::store::MemoryStore;
    use std::sync::atomic::Ordering;

    fn principal() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            role: Role::User,
        }
    }

    fn request(event_id: Uuid, tickets: Vec<(Uuid, i32)>) -> CheckoutRequest {
        CheckoutRequest {
            event_id,
            tickets: tickets
                .into_iter()
                .map(|(ticket_type_id, quantity)| TicketRequest {
                    ticket_type_id,
                    quantity,
                })
                .collect(),
            customer_name: "Ada Lovelace".to_string(),
            customer_email: "ada@example.com".to_string(),
            customer_phone: Some(" ".to_string()),
        }
    }

    #[test]
    fn test_minor_units_rounding() {
        assert_eq!(to_minor_units(Decimal::new(1999, 2)).unwrap(), 1999);
        assert_eq!(to_minor_units(Decimal::new(12345, 3)).unwrap(), 1235);
        assert_eq!(to_minor_units(Decimal::new(800, 0)).unwrap(), 80000);
    }

    #[tokio::test]
    async fn test_checkout_creates_pending_booking_with_total() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Gala").await;
        let vip = store
            .seed_ticket_type(event.id, "VIP", Decimal::new(2550, 2), 5)
            .await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 50)
            .await;

        let orchestrator = CheckoutOrchestrator::new(&store, &payments, &config);
        let started = orchestrator
            .create_checkout_session(&principal(), request(event.id, vec![(vip.id, 2), (ga.id, 3)]))
            .await
            .unwrap();

        assert_eq!(started.total_amount, Decimal::new(8100, 2));

        let saved = store
            .find_by_session(&started.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.booking.status, BookingStatus::Pending);
        assert_eq!(saved.booking.total_amount, Decimal::new(8100, 2));
        assert_eq!(saved.booking.customer_phone, None);
        assert_eq!(saved.tickets.len(), 2);

        let vip_after = store.get_ticket_type(vip.id).await.unwrap().unwrap();
        assert_eq!(vip_after.available_tickets, 5);
        assert_eq!(vip_after.booked_tickets, 0);
    }

    #[tokio::test]
    async fn test_session_request_carries_correlation_metadata() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let mut config = Config::for_local("whsec_test");
        config.app_base_url = "https://tickets.example/".to_string();
        let event = store.seed_event("Gala").await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 50)
            .await;
        let user = principal();

        let started = CheckoutOrchestrator::new(&store, &payments, &config)
            .create_checkout_session(&user, request(event.id, vec![(ga.id, 2)]))
            .await
            .unwrap();

        let requests = payments.requests().await;
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert_eq!(sent.metadata.booking_id, started.booking_id);
        assert_eq!(sent.metadata.event_id, event.id);
        assert_eq!(sent.metadata.user_id, user.user_id);
        assert_eq!(
            sent.success_url,
            "https://tickets.example/user/bookings?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(
            sent.cancel_url,
            format!("https://tickets.example/user/events/{}", event.id)
        );
        assert_eq!(sent.line_items[0].name, "Gala - GA");
        assert_eq!(sent.line_items[0].unit_amount, 1000);
        let window = sent.expires_at - Utc::now();
        assert!(window > Duration::minutes(29) && window <= Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_insufficient_inventory_rejects_whole_order() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Gala").await;
        let vip = store
            .seed_ticket_type(event.id, "VIP", Decimal::new(2500, 2), 2)
            .await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 50)
            .await;

        let result = CheckoutOrchestrator::new(&store, &payments, &config)
            .create_checkout_session(&principal(), request(event.id, vec![(ga.id, 1), (vip.id, 3)]))
            .await;

        match result {
            Err(AppError::ValidationError(msg)) => {
                assert!(msg.contains("Insufficient tickets for VIP"), "{}", msg)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(store.booking_count().await, 0);
        assert!(payments.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_empty_zero_duplicate_and_foreign_lines() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Gala").await;
        let other = store.seed_event("Expo").await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 50)
            .await;
        let foreign = store
            .seed_ticket_type(other.id, "GA", Decimal::new(1000, 2), 50)
            .await;
        let orchestrator = CheckoutOrchestrator::new(&store, &payments, &config);
        let user = principal();

        let empty = orchestrator
            .create_checkout_session(&user, request(event.id, vec![]))
            .await;
        assert!(matches!(empty, Err(AppError::ValidationError(_))));

        let zero = orchestrator
            .create_checkout_session(&user, request(event.id, vec![(ga.id, 0)]))
            .await;
        assert!(matches!(zero, Err(AppError::ValidationError(_))));

        let duplicate = orchestrator
            .create_checkout_session(&user, request(event.id, vec![(ga.id, 1), (ga.id, 1)]))
            .await;
        assert!(matches!(duplicate, Err(AppError::ValidationError(_))));

        let cross_event = orchestrator
            .create_checkout_session(&user, request(event.id, vec![(foreign.id, 1)]))
            .await;
        assert!(matches!(cross_event, Err(AppError::NotFound(_))));

        assert_eq!(store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_ticket_type_reported_before_quantity_errors() {
        let store = MemoryStore::new();
        let event = store.seed_event("Gala").await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 50)
            .await;
        let unknown = Uuid::new_v4();

        let result = validate_order(
            &store,
            event.id,
            &[
                TicketRequest {
                    ticket_type_id: ga.id,
                    quantity: 0,
                },
                TicketRequest {
                    ticket_type_id: unknown,
                    quantity: 1,
                },
            ],
        )
        .await;

        match result {
            Err(AppError::NotFound(msg)) => assert!(msg.contains(&unknown.to_string())),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_priced_order_rejected() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Open day").await;
        let free = store
            .seed_ticket_type(event.id, "Free", Decimal::ZERO, 10)
            .await;

        let result = CheckoutOrchestrator::new(&store, &payments, &config)
            .create_checkout_session(&principal(), request(event.id, vec![(free.id, 1)]))
            .await;

        assert!(matches!(result, Err(AppError::ValidationError(msg)) if msg.contains("amount")));
    }

    #[tokio::test]
    async fn test_payment_failure_discards_booking() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        payments.fail_create.store(true, Ordering::SeqCst);
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Gala").await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 50)
            .await;

        let result = CheckoutOrchestrator::new(&store, &payments, &config)
            .create_checkout_session(&principal(), request(event.id, vec![(ga.id, 1)]))
            .await;

        assert!(matches!(result, Err(AppError::PaymentProviderError(_))));
        assert_eq!(store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_store_failures_surface_as_upstream_errors() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Gala").await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 50)
            .await;
        let orchestrator = CheckoutOrchestrator::new(&store, &payments, &config);

        store.fail.fetch_ticket_types.store(true, Ordering::SeqCst);
        let lookup = orchestrator
            .create_checkout_session(&principal(), request(event.id, vec![(ga.id, 1)]))
            .await;
        assert!(matches!(lookup, Err(AppError::DatabaseError(_))));
        store.fail.fetch_ticket_types.store(false, Ordering::SeqCst);

        store.fail.insert_booking.store(true, Ordering::SeqCst);
        let insert = orchestrator
            .create_checkout_session(&principal(), request(event.id, vec![(ga.id, 1)]))
            .await;
        assert!(matches!(insert, Err(AppError::DatabaseError(_))));
        assert_eq!(store.booking_count().await, 0);
        assert!(payments.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_session_id_write_failure_still_succeeds() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Gala").await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 50)
            .await;
        store.fail.set_session_id.store(true, Ordering::SeqCst);

        let started = CheckoutOrchestrator::new(&store, &payments, &config)
            .create_checkout_session(&principal(), request(event.id, vec![(ga.id, 1)]))
            .await
            .unwrap();

        assert!(started.session_url.contains(&started.session_id));
        let booking = store.get_booking(started.booking_id).await.unwrap().unwrap();
        assert_eq!(booking.booking.stripe_session_id, None);
    }

    #[tokio::test]
    async fn test_direct_booking_confirms_and_commits_inventory() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Gala").await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 5)
            .await;

        let booking = CheckoutOrchestrator::new(&store, &payments, &config)
            .create_direct_booking(&principal(), request(event.id, vec![(ga.id, 3)]))
            .await
            .unwrap();

        assert_eq!(booking.booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.tickets[0].subtotal, Decimal::new(3000, 2));
        let after = store.get_ticket_type(ga.id).await.unwrap().unwrap();
        assert_eq!(after.available_tickets, 2);
        assert_eq!(after.booked_tickets, 3);
        assert!(payments.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_direct_booking_tolerates_inventory_failure() {
        let store = MemoryStore::new();
        let payments = MockPaymentProvider::new();
        let config = Config::for_local("whsec_test");
        let event = store.seed_event("Gala").await;
        let ga = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 5)
            .await;
        store.fail.commit_inventory.store(true, Ordering::SeqCst);

        let booking = CheckoutOrchestrator::new(&store, &payments, &config)
            .create_direct_booking(&principal(), request(event.id, vec![(ga.id, 1)]))
            .await
            .unwrap();

        assert_eq!(booking.booking.status, BookingStatus::Confirmed);
        let after = store.get_ticket_type(ga.id).await.unwrap().unwrap();
        assert_eq!(after.available_tickets, 5);
    }
}
