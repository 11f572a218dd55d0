//! The booking, inventory and payment reconciliation workflow.
//!
//! - [`catalog`] manages the events everything else belongs to.
//! - [`ledger`] owns ticket type counters.
//! - [`checkout`] validates orders, writes bookings and opens payment sessions.
//! - [`settlement`] applies webhook outcomes to bookings and inventory.
//! - [`verification`] answers "did my payment go through" after redirect.
//! - [`queries`] reads bookings back for their owners and for admins.

pub mod catalog;
pub mod checkout;
pub mod ledger;
pub mod queries;
pub mod settlement;
pub mod verification;

pub use catalog::EventCatalog;
pub use checkout::{CheckoutOrchestrator, CheckoutRequest, CheckoutStarted, TicketRequest};
pub use ledger::{InventoryLedger, InventoryReport};
pub use settlement::{Settlement, SettlementReconciler};
pub use verification::{PaymentVerification, VerificationQuery};
