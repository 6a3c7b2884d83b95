//! Notification events emitted by the engine.
//!
//! Events carry identifiers rather than full records; a dispatcher fetches
//! whatever it needs. Delivery is fire-and-forget: a failed send is logged
//! and never rolls back the state transition that produced it.

pub mod channels;
pub mod types;

pub use channels::{
    emit, notification_channel, NotificationReceiver, NotificationSender, DEFAULT_CHANNEL_BUFFER,
};
pub use types::Notification;
