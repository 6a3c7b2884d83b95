//! Background processors.
//!
//! - `DrawingWorker`: periodic sweep that auto-closes sales, executes due
//!   drawings, and processes fulfillment timeouts.

pub mod drawing_worker;

pub use drawing_worker::{DrawingWorker, SweepReport};
