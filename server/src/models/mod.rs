pub mod booking;
pub mod event;
pub mod ticket;
pub mod user;

pub use booking::{
    Booking, BookingLineItem, BookingStatus, BookingWithLines, NewBooking, NewLineItem,
};
pub use event::{Event, EventChanges, NewEvent};
pub use ticket::{NewTicketType, TicketType, TicketTypeChanges};
pub use user::{Principal, Role};
