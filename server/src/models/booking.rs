use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Confirmed and cancelled bookings never change status again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub stripe_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One ticket line of a booking. Prices are a snapshot taken at booking time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingLineItem {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub price_per_ticket: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingWithLines {
    #[serde(flatten)]
    pub booking: Booking,
    pub tickets: Vec<BookingLineItem>,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub price_per_ticket: Decimal,
}

impl NewLineItem {
    pub fn subtotal(&self) -> Decimal {
        self.price_per_ticket * Decimal::from(self.quantity)
    }
}

/// A booking and its lines as they are handed to the store for one atomic insert.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub lines: Vec<NewLineItem>,
}
