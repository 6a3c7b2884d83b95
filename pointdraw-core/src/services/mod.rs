//! Engine services.
//!
//! - `LifecycleService`: drawing status state machine
//! - `PurchaseService`: atomic ticket purchase against the point ledger
//! - `SelectionService`: at-most-once, CSPRNG-based winner selection
//! - `FulfillmentService`: prize delivery state machine and timeouts

pub mod fulfillment;
pub mod lifecycle;
pub mod purchase;
pub mod selection;

pub use fulfillment::{FulfillmentService, TimeoutReport};
pub use lifecycle::LifecycleService;
pub use purchase::{PurchaseReceipt, PurchaseService};
pub use selection::{ExecutionReport, SelectionService, Winner};
