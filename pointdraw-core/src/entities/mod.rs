pub mod drawing;
pub mod fulfillment;
pub mod prize;
pub mod ticket;

pub use drawing::{Drawing, DrawingKind, DrawingStatus, NewDrawing};
pub use fulfillment::{Fulfillment, FulfillmentStatus, ShippingAddress};
pub use prize::{NewPrize, Prize};
pub use ticket::Ticket;
