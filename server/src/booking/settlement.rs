use tracing::{error, info, warn};
use uuid::Uuid;

use super::ledger::{InventoryLedger, InventoryReport};
use crate::models::BookingStatus;
use crate::payments::{PaymentStatus, WebhookEvent};
use crate::store::BookingStore;
use crate::utils::error::AppError;

/// What applying one payment outcome did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Confirmed {
        booking_id: Uuid,
        inventory: InventoryReport,
    },
    Cancelled {
        booking_id: Uuid,
    },
    /// The booking had already reached a terminal status; nothing was written.
    Unchanged {
        booking_id: Uuid,
        status: BookingStatus,
    },
    /// The event needs no state change.
    Ignored,
}

/// Applies webhook outcomes to bookings. Every operation is safe to repeat:
/// status changes are conditional on the booking still being `pending`.
pub struct SettlementReconciler<'a> {
    store: &'a dyn BookingStore,
}

impl<'a> SettlementReconciler<'a> {
    pub fn new(store: &'a dyn BookingStore) -> Self {
        Self { store }
    }

    pub async fn apply(&self, event: WebhookEvent) -> Result<Settlement, AppError> {
        match event {
            WebhookEvent::CheckoutCompleted {
                session_id,
                payment_status: PaymentStatus::Paid,
                payment_intent_id: Some(payment_intent_id),
            } => self.confirm_payment(&session_id, &payment_intent_id).await,
            WebhookEvent::CheckoutCompleted {
                session_id,
                payment_status,
                ..
            } => {
                info!(
                    session_id = %session_id,
                    payment_status = ?payment_status,
                    "Checkout completed without a settled payment; waiting"
                );
                Ok(Settlement::Ignored)
            }
            WebhookEvent::CheckoutExpired { session_id } => self.expire_session(&session_id).await,
            WebhookEvent::PaymentFailed { payment_intent_id } => {
                Ok(self.record_payment_failure(&payment_intent_id))
            }
            WebhookEvent::Unhandled { event_type } => {
                info!(event_type = %event_type, "Unhandled webhook event type");
                Ok(Settlement::Ignored)
            }
        }
    }

    /// Confirms the booking behind `session_id` and commits its inventory.
    /// Inventory is committed only by the call that performed the
    /// pending → confirmed transition, so redeliveries never deduct twice.
    pub async fn confirm_payment(
        &self,
        session_id: &str,
        payment_intent_id: &str,
    ) -> Result<Settlement, AppError> {
        let Some(found) = self.store.find_by_session(session_id).await? else {
            error!(
                session_id = %session_id,
                payment_intent_id = %payment_intent_id,
                "Paid session has no local booking; investigate"
            );
            return Err(AppError::NotFound(format!(
                "No booking for session {}",
                session_id
            )));
        };
        let booking_id = found.booking.id;

        match found.booking.status {
            BookingStatus::Confirmed => {
                info!(booking_id = %booking_id, "Booking already confirmed");
                return Ok(Settlement::Unchanged {
                    booking_id,
                    status: BookingStatus::Confirmed,
                });
            }
            BookingStatus::Cancelled => {
                warn!(
                    booking_id = %booking_id,
                    session_id = %session_id,
                    payment_intent_id = %payment_intent_id,
                    "Payment received for a cancelled booking; needs operator follow-up"
                );
                return Ok(Settlement::Unchanged {
                    booking_id,
                    status: BookingStatus::Cancelled,
                });
            }
            BookingStatus::Pending => {}
        }

        if !self
            .store
            .mark_confirmed(booking_id, payment_intent_id)
            .await?
        {
            // Another delivery moved it out of pending between our read and write.
            let status = self.current_status(booking_id).await?;
            info!(booking_id = %booking_id, status = %status, "Booking settled concurrently");
            return Ok(Settlement::Unchanged { booking_id, status });
        }

        let inventory = InventoryLedger::new(self.store)
            .commit_lines(booking_id, &found.tickets)
            .await;

        info!(
            booking_id = %booking_id,
            payment_intent_id = %payment_intent_id,
            lines = inventory.committed.len(),
            "Booking confirmed"
        );
        Ok(Settlement::Confirmed {
            booking_id,
            inventory,
        })
    }

    /// Cancels the booking behind an expired session if it is still pending.
    /// No inventory is released because none was committed while pending.
    pub async fn expire_session(&self, session_id: &str) -> Result<Settlement, AppError> {
        let Some(found) = self.store.find_by_session(session_id).await? else {
            warn!(session_id = %session_id, "Expired session has no local booking");
            return Err(AppError::NotFound(format!(
                "No booking for session {}",
                session_id
            )));
        };
        let booking_id = found.booking.id;

        if found.booking.status.is_terminal() {
            return Ok(Settlement::Unchanged {
                booking_id,
                status: found.booking.status,
            });
        }

        if self.store.mark_cancelled(booking_id).await? {
            info!(booking_id = %booking_id, session_id = %session_id, "Booking cancelled");
            Ok(Settlement::Cancelled { booking_id })
        } else {
            let status = self.current_status(booking_id).await?;
            Ok(Settlement::Unchanged { booking_id, status })
        }
    }

    pub fn record_payment_failure(&self, payment_intent_id: &str) -> Settlement {
        warn!(payment_intent_id = %payment_intent_id, "Payment failed");
        Settlement::Ignored
    }

    async fn current_status(&self, booking_id: Uuid) -> Result<BookingStatus, AppError> {
        self.store
            .get_booking(booking_id)
            .await?
            .map(|b| b.booking.status)
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBooking, NewLineItem, TicketType};
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    async fn pending_booking(store: &MemoryStore, quantity: i32) -> (TicketType, Uuid, String) {
        let event = store.seed_event("Gala").await;
        let tt = store
            .seed_ticket_type(event.id, "GA", Decimal::new(1000, 2), 5)
            .await;
        let created = store
            .insert_booking(NewBooking {
                event_id: event.id,
                user_id: Uuid::new_v4(),
                customer_name: "Ada".to_string(),
                customer_email: "ada@example.com".to_string(),
                customer_phone: None,
                total_amount: tt.price * Decimal::from(quantity),
                status: BookingStatus::Pending,
                lines: vec![NewLineItem {
                    ticket_type_id: tt.id,
                    quantity,
                    price_per_ticket: tt.price,
                }],
            })
            .await
            .unwrap();
        let session_id = format!("cs_test_{}", created.booking.id.simple());
        store
            .set_session_id(created.booking.id, &session_id)
            .await
            .unwrap();
        (tt, created.booking.id, session_id)
    }

    async fn counters(store: &MemoryStore, id: Uuid) -> (i32, i32) {
        let tt = store.get_ticket_type(id).await.unwrap().unwrap();
        (tt.available_tickets, tt.booked_tickets)
    }

    #[tokio::test]
    async fn test_paid_confirms_and_commits_inventory() {
        let store = MemoryStore::new();
        let (tt, booking_id, session_id) = pending_booking(&store, 3).await;

        let outcome = SettlementReconciler::new(&store)
            .confirm_payment(&session_id, "pi_1")
            .await
            .unwrap();

        assert!(matches!(outcome, Settlement::Confirmed { inventory, .. } if inventory.is_complete()));
        let booking = store.get_booking(booking_id).await.unwrap().unwrap().booking;
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(counters(&store, tt.id).await, (2, 3));
    }

    #[tokio::test]
    async fn test_redelivered_paid_event_deducts_once() {
        let store = MemoryStore::new();
        let (tt, booking_id, session_id) = pending_booking(&store, 3).await;
        let reconciler = SettlementReconciler::new(&store);

        reconciler.confirm_payment(&session_id, "pi_1").await.unwrap();
        let second = reconciler.confirm_payment(&session_id, "pi_1").await.unwrap();

        assert_eq!(
            second,
            Settlement::Unchanged {
                booking_id,
                status: BookingStatus::Confirmed
            }
        );
        assert_eq!(counters(&store, tt.id).await, (2, 3));
    }

    #[tokio::test]
    async fn test_concurrent_redelivery_deducts_once() {
        let store = MemoryStore::new();
        let (tt, _, session_id) = pending_booking(&store, 2).await;
        let reconciler = SettlementReconciler::new(&store);

        let (a, b) = tokio::join!(
            reconciler.confirm_payment(&session_id, "pi_1"),
            reconciler.confirm_payment(&session_id, "pi_1"),
        );
        let confirmed = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|s| matches!(s, Settlement::Confirmed { .. }))
            .count();

        assert_eq!(confirmed, 1);
        assert_eq!(counters(&store, tt.id).await, (3, 2));
    }

    #[tokio::test]
    async fn test_expiry_cancels_pending_without_touching_inventory() {
        let store = MemoryStore::new();
        let (tt, booking_id, session_id) = pending_booking(&store, 3).await;

        let outcome = SettlementReconciler::new(&store)
            .expire_session(&session_id)
            .await
            .unwrap();

        assert_eq!(outcome, Settlement::Cancelled { booking_id });
        assert_eq!(counters(&store, tt.id).await, (5, 0));
    }

    #[tokio::test]
    async fn test_expiry_after_confirmation_is_noop() {
        let store = MemoryStore::new();
        let (tt, booking_id, session_id) = pending_booking(&store, 1).await;
        let reconciler = SettlementReconciler::new(&store);
        reconciler.confirm_payment(&session_id, "pi_1").await.unwrap();

        let outcome = reconciler.expire_session(&session_id).await.unwrap();

        assert_eq!(
            outcome,
            Settlement::Unchanged {
                booking_id,
                status: BookingStatus::Confirmed
            }
        );
        let booking = store.get_booking(booking_id).await.unwrap().unwrap().booking;
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(counters(&store, tt.id).await, (4, 1));
    }

    #[tokio::test]
    async fn test_paid_after_expiry_keeps_cancelled() {
        let store = MemoryStore::new();
        let (tt, booking_id, session_id) = pending_booking(&store, 2).await;
        let reconciler = SettlementReconciler::new(&store);
        reconciler.expire_session(&session_id).await.unwrap();

        let outcome = reconciler.confirm_payment(&session_id, "pi_late").await.unwrap();

        assert_eq!(
            outcome,
            Settlement::Unchanged {
                booking_id,
                status: BookingStatus::Cancelled
            }
        );
        assert_eq!(counters(&store, tt.id).await, (5, 0));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let reconciler = SettlementReconciler::new(&store);

        let paid = reconciler.confirm_payment("cs_missing", "pi_1").await;
        assert!(matches!(paid, Err(AppError::NotFound(_))));

        let expired = reconciler.expire_session("cs_missing").await;
        assert!(matches!(expired, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_shortfall_keeps_confirmation() {
        let store = MemoryStore::new();
        let (tt, booking_id, session_id) = pending_booking(&store, 3).await;
        // Another buyer took most of the inventory in the meantime.
        assert!(store.commit_inventory(tt.id, 4).await.unwrap());

        let outcome = SettlementReconciler::new(&store)
            .confirm_payment(&session_id, "pi_1")
            .await
            .unwrap();

        match outcome {
            Settlement::Confirmed { inventory, .. } => {
                assert_eq!(inventory.shortfalls, vec![tt.id])
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let booking = store.get_booking(booking_id).await.unwrap().unwrap().booking;
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(counters(&store, tt.id).await, (1, 4));
    }

    #[tokio::test]
    async fn test_apply_dispatches_by_event() {
        let store = MemoryStore::new();
        let (_, booking_id, session_id) = pending_booking(&store, 1).await;
        let reconciler = SettlementReconciler::new(&store);

        let unpaid = reconciler
            .apply(WebhookEvent::CheckoutCompleted {
                session_id: session_id.clone(),
                payment_status: PaymentStatus::Unpaid,
                payment_intent_id: None,
            })
            .await
            .unwrap();
        assert_eq!(unpaid, Settlement::Ignored);

        let failed = reconciler
            .apply(WebhookEvent::PaymentFailed {
                payment_intent_id: "pi_1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(failed, Settlement::Ignored);
        let booking = store.get_booking(booking_id).await.unwrap().unwrap().booking;
        assert_eq!(booking.status, BookingStatus::Pending);

        let paid = reconciler
            .apply(WebhookEvent::CheckoutCompleted {
                session_id,
                payment_status: PaymentStatus::Paid,
                payment_intent_id: Some("pi_1".to_string()),
            })
            .await
            .unwrap();
        assert!(matches!(paid, Settlement::Confirmed { .. }));
    }
}
