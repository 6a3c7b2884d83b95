//! DrawingWorker processor.
//!
//! One sweep:
//! - close sales for every `Open` drawing inside the 5-minute lead window
//! - execute every `Closed` drawing past its draw time
//! - process fulfillment timeouts
//!
//! Drawings are processed independently; one failure is recorded against
//! its drawing id and the sweep continues. Every mutation underneath is a
//! conditional write, so overlapping sweeps (two worker instances, or a
//! worker racing an operator) are safe: the loser of a race just skips.

use crate::entities::DrawingStatus;
use crate::services::{FulfillmentService, LifecycleService, SelectionService, TimeoutReport};
use crate::store::DrawingStore;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Aggregated outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub sales_closed: Vec<Uuid>,
    pub executed: Vec<Uuid>,
    pub timeouts: TimeoutReport,
    pub errors: Vec<(Uuid, String)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct DrawingWorker {
    drawings: Arc<dyn DrawingStore>,
    lifecycle: Arc<LifecycleService>,
    selection: Arc<SelectionService>,
    fulfillment: Arc<FulfillmentService>,
}

impl DrawingWorker {
    pub fn new(
        drawings: Arc<dyn DrawingStore>,
        lifecycle: Arc<LifecycleService>,
        selection: Arc<SelectionService>,
        fulfillment: Arc<FulfillmentService>,
    ) -> Self {
        Self {
            drawings,
            lifecycle,
            selection,
            fulfillment,
        }
    }

    /// Run the worker until shutdown is signaled, sweeping every `interval`.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "DrawingWorker started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("DrawingWorker received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(interval) => {
                    let report = self.sweep(OffsetDateTime::now_utc()).await;
                    if !report.is_clean() {
                        for (drawing_id, message) in &report.errors {
                            error!(%drawing_id, message, "Sweep error");
                        }
                    }
                }
            }
        }

        info!("DrawingWorker shutdown complete");
    }

    /// Execute one sweep at `now`.
    pub async fn sweep(&self, now: OffsetDateTime) -> SweepReport {
        let mut report = SweepReport::default();
        self.close_due_sales(now, &mut report).await;
        self.execute_due_drawings(now, &mut report).await;

        match self.fulfillment.process_timeouts(now).await {
            Ok(timeouts) => report.timeouts = timeouts,
            Err(e) => report.errors.push((Uuid::nil(), format!("timeout sweep: {e}"))),
        }

        info!(
            sales_closed = report.sales_closed.len(),
            executed = report.executed.len(),
            errors = report.errors.len(),
            "Sweep finished"
        );
        report
    }

    async fn close_due_sales(&self, now: OffsetDateTime, report: &mut SweepReport) {
        let open = match self.drawings.find_by_status(DrawingStatus::Open).await {
            Ok(open) => open,
            Err(e) => {
                report
                    .errors
                    .push((Uuid::nil(), format!("failed to list open drawings: {e}")));
                return;
            }
        };

        for drawing in open {
            if !drawing.sales_should_close(now) {
                continue;
            }
            match self.lifecycle.close(drawing.id, now).await {
                Ok(_) => {
                    info!(drawing_id = %drawing.id, "Auto-closed ticket sales");
                    report.sales_closed.push(drawing.id);
                }
                Err(e) if e.is_conflict() => {
                    // Another worker or an operator already moved it.
                    debug!(drawing_id = %drawing.id, "Close already handled");
                }
                Err(e) => report.errors.push((drawing.id, e.to_string())),
            }
        }
    }

    async fn execute_due_drawings(&self, now: OffsetDateTime, report: &mut SweepReport) {
        let closed = match self.drawings.find_by_status(DrawingStatus::Closed).await {
            Ok(closed) => closed,
            Err(e) => {
                report
                    .errors
                    .push((Uuid::nil(), format!("failed to list closed drawings: {e}")));
                return;
            }
        };

        for drawing in closed {
            if !drawing.ready_to_execute(now) {
                continue;
            }
            match self.selection.execute(drawing.id, now).await {
                Ok(result) => {
                    info!(
                        drawing_id = %drawing.id,
                        winners = result.winners.len(),
                        "Auto-executed drawing"
                    );
                    report.executed.push(drawing.id);
                }
                Err(e) if e.is_conflict() => {
                    debug!(drawing_id = %drawing.id, "Execution already handled");
                }
                Err(e) => report.errors.push((drawing.id, e.to_string())),
            }
        }
    }
}
