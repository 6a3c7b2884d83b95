#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod entities;
pub mod error;
pub mod events;
pub mod ledger;
pub mod processors;
pub mod services;
pub mod store;
