use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A priced category of ticket with finite capacity.
///
/// `available_tickets + booked_tickets == total_tickets` holds for every row
/// written by the inventory ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub total_tickets: i32,
    pub available_tickets: i32,
    pub booked_tickets: i32,
    pub created_at: DateTime<Utc>,
}

impl TicketType {
    pub fn is_balanced(&self) -> bool {
        self.available_tickets >= 0
            && self.available_tickets + self.booked_tickets == self.total_tickets
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicketType {
    pub name: String,
    pub price: Decimal,
    pub total_tickets: i32,
}

/// Fields an operator may change after creation. Counters are owned by the
/// inventory ledger and are deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketTypeChanges {
    pub name: Option<String>,
    pub price: Option<Decimal>,
}
