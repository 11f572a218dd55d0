use serde::Serialize;
use tracing::{debug, error};

use crate::models::{Booking, BookingStatus, Principal};
use crate::payments::PaymentProvider;
use crate::store::BookingStore;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct PaymentVerification {
    pub confirmed: bool,
    pub booking: Booking,
}

impl PaymentVerification {
    pub fn message(&self) -> &'static str {
        if self.confirmed {
            "Payment confirmed"
        } else {
            "Payment processing"
        }
    }
}

/// Post-redirect status check. Reads local truth: a paid session whose
/// webhook has not landed yet reports the booking as still processing.
pub struct VerificationQuery<'a> {
    store: &'a dyn BookingStore,
    payments: &'a dyn PaymentProvider,
}

impl<'a> VerificationQuery<'a> {
    pub fn new(store: &'a dyn BookingStore, payments: &'a dyn PaymentProvider) -> Self {
        Self { store, payments }
    }

    pub async fn verify(
        &self,
        session_id: &str,
        principal: &Principal,
    ) -> Result<PaymentVerification, AppError> {
        let (session, booking) = tokio::join!(
            self.payments.retrieve_session(session_id),
            self.store
                .find_by_session_for_user(session_id, principal.user_id),
        );

        let session = session.map_err(|e| {
            error!(session_id = %session_id, error = %e, "Failed to retrieve payment session");
            AppError::PaymentProviderError(e)
        })?;
        if !session.is_paid() {
            debug!(session_id = %session_id, status = ?session.payment_status, "Session not paid");
            return Err(AppError::PaymentIncomplete(
                "Payment not completed".to_string(),
            ));
        }

        // Scoped to the requester: someone else's booking is indistinguishable
        // from a missing one.
        let booking = booking?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        Ok(PaymentVerification {
            confirmed: booking.status == BookingStatus::Confirmed,
            booking,
        })
    }
}
