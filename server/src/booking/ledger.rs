use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{BookingLineItem, NewTicketType, TicketType, TicketTypeChanges};
use crate::store::BookingStore;
use crate::utils::error::AppError;

/// Outcome of moving a booking's lines from available to booked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryReport {
    pub committed: Vec<Uuid>,
    /// Lines refused because fewer tickets were available than booked.
    pub shortfalls: Vec<Uuid>,
    /// Lines whose update could not be written at all.
    pub failed: Vec<Uuid>,
}

impl InventoryReport {
    pub fn is_complete(&self) -> bool {
        self.shortfalls.is_empty() && self.failed.is_empty()
    }
}

/// All writes to ticket type counters go through here.
pub struct InventoryLedger<'a> {
    store: &'a dyn BookingStore,
}

impl<'a> InventoryLedger<'a> {
    pub fn new(store: &'a dyn BookingStore) -> Self {
        Self { store }
    }

    pub async fn create_ticket_type(
        &self,
        event_id: Uuid,
        new: NewTicketType,
    ) -> Result<TicketType, AppError> {
        if new.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Ticket type name is required.".to_string(),
            ));
        }
        if new.total_tickets <= 0 {
            return Err(AppError::ValidationError(
                "total_tickets must be a positive integer greater than 0.".to_string(),
            ));
        }
        validate_price(new.price)?;

        if self.store.fetch_event(event_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Event {} not found", event_id)));
        }

        let ticket_type = self.store.create_ticket_type(event_id, new).await?;
        info!(
            ticket_type_id = %ticket_type.id,
            event_id = %event_id,
            total = ticket_type.total_tickets,
            "Ticket type created"
        );
        Ok(ticket_type)
    }

    pub async fn update_ticket_type(
        &self,
        id: Uuid,
        changes: TicketTypeChanges,
    ) -> Result<TicketType, AppError> {
        if let Some(name) = &changes.name {
            if name.trim().is_empty() {
                return Err(AppError::ValidationError(
                    "Ticket type name cannot be empty.".to_string(),
                ));
            }
        }
        if let Some(price) = changes.price {
            validate_price(price)?;
        }

        self.store
            .update_ticket_type(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {} not found", id)))
    }

    pub async fn get_ticket_type(&self, id: Uuid) -> Result<TicketType, AppError> {
        self.store
            .get_ticket_type(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {} not found", id)))
    }

    /// Refuses while a pending or confirmed booking still references the
    /// ticket type. The check and the delete are separate statements.
    pub async fn delete_ticket_type(&self, id: Uuid) -> Result<(), AppError> {
        if self.store.get_ticket_type(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Ticket type {} not found", id)));
        }
        if self.store.ticket_type_in_use(id).await? {
            return Err(AppError::ValidationError(
                "Ticket type has active bookings and cannot be deleted.".to_string(),
            ));
        }
        self.store.delete_ticket_type(id).await?;
        info!(ticket_type_id = %id, "Ticket type deleted");
        Ok(())
    }

    /// Commits every line of a booking. A line that cannot be committed is
    /// logged and skipped; the remaining lines are still attempted.
    pub async fn commit_lines(&self, booking_id: Uuid, lines: &[BookingLineItem]) -> InventoryReport {
        let mut report = InventoryReport::default();

        for line in lines {
            match self
                .store
                .commit_inventory(line.ticket_type_id, line.quantity)
                .await
            {
                Ok(true) => report.committed.push(line.ticket_type_id),
                Ok(false) => {
                    error!(
                        booking_id = %booking_id,
                        ticket_type_id = %line.ticket_type_id,
                        quantity = line.quantity,
                        "Inventory shortfall: not enough tickets left to commit booked line"
                    );
                    report.shortfalls.push(line.ticket_type_id);
                }
                Err(e) => {
                    error!(
                        booking_id = %booking_id,
                        ticket_type_id = %line.ticket_type_id,
                        error = %e,
                        "Failed to update inventory for ticket line"
                    );
                    report.failed.push(line.ticket_type_id);
                }
            }
        }

        if !report.is_complete() {
            warn!(
                booking_id = %booking_id,
                shortfalls = report.shortfalls.len(),
                failed = report.failed.len(),
                "Inventory needs reconciliation"
            );
        }

        report
    }
}

fn validate_price(price: Decimal) -> Result<(), AppError> {
    if price.is_sign_negative() {
        return Err(AppError::ValidationError(
            "Ticket price cannot be negative.".to_string(),
        ));
    }
    Ok(())
}
