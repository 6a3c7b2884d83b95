//! Prize fulfillment state machine.
//!
//! Drives a winning ticket's prize from `Pending` through notification,
//! address confirmation, shipping and delivery, or forfeiture. Every
//! persisted transition is guarded on the observed status, so a timeout
//! sweep and an operator can race without double effect.

use crate::entities::{Fulfillment, FulfillmentStatus, ShippingAddress};
use crate::error::EngineError;
use crate::events::{self, Notification, NotificationSender};
use crate::store::{FulfillmentFilter, FulfillmentStore, Page};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

/// Outcome of one timeout sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutReport {
    /// Winners past the 7-day reminder mark but not yet forfeited.
    pub warnings: u32,
    /// Records forfeited by this sweep.
    pub forfeited: u32,
}

pub struct FulfillmentService {
    fulfillments: Arc<dyn FulfillmentStore>,
    notifier: Option<NotificationSender>,
}

impl FulfillmentService {
    pub fn new(
        fulfillments: Arc<dyn FulfillmentStore>,
        notifier: Option<NotificationSender>,
    ) -> Self {
        Self {
            fulfillments,
            notifier,
        }
    }

    /// Mark the winner as notified; starts the confirmation clock.
    pub async fn notify_winner(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Fulfillment, EngineError> {
        self.transition(id, FulfillmentStatus::WinnerNotified, |f| {
            f.notified_at = Some(now);
        })
        .await
    }

    /// Winner supplies a shipping address; all fields must be present.
    pub async fn confirm_address(
        &self,
        id: Uuid,
        address: ShippingAddress,
        now: OffsetDateTime,
    ) -> Result<Fulfillment, EngineError> {
        let missing = address.missing_fields();
        if !missing.is_empty() {
            return Err(EngineError::Validation(format!(
                "missing address fields: {}",
                missing.join(", ")
            )));
        }
        self.transition(id, FulfillmentStatus::AddressConfirmed, |f| {
            f.address_confirmed_at = Some(now);
            f.address = Some(address);
        })
        .await
    }

    /// Operator rejects the address; the winner may resubmit.
    pub async fn mark_address_invalid(
        &self,
        id: Uuid,
        _now: OffsetDateTime,
    ) -> Result<Fulfillment, EngineError> {
        self.transition(id, FulfillmentStatus::AddressInvalid, |_| {}).await
    }

    /// Record shipment with carrier and tracking number.
    pub async fn ship(
        &self,
        id: Uuid,
        carrier: String,
        tracking: String,
        now: OffsetDateTime,
    ) -> Result<Fulfillment, EngineError> {
        if carrier.trim().is_empty() {
            return Err(EngineError::Validation("carrier is required".into()));
        }
        if tracking.trim().is_empty() {
            return Err(EngineError::Validation("tracking number is required".into()));
        }
        self.transition(id, FulfillmentStatus::Shipped, |f| {
            f.shipped_at = Some(now);
            f.carrier = Some(carrier);
            f.tracking = Some(tracking);
        })
        .await
    }

    pub async fn mark_delivered(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Fulfillment, EngineError> {
        self.transition(id, FulfillmentStatus::Delivered, |f| {
            f.delivered_at = Some(now);
        })
        .await
    }

    pub async fn forfeit(
        &self,
        id: Uuid,
        reason: &str,
        now: OffsetDateTime,
    ) -> Result<Fulfillment, EngineError> {
        let reason = if reason.is_empty() { "forfeited" } else { reason };
        let reason = reason.to_string();
        self.transition(id, FulfillmentStatus::Forfeited, |f| {
            f.forfeited_at = Some(now);
            f.notes = Some(reason);
        })
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Fulfillment, EngineError> {
        self.load(id).await
    }

    pub async fn list(
        &self,
        filter: FulfillmentFilter,
        page: Page,
    ) -> Result<(Vec<Fulfillment>, u64), EngineError> {
        let total = self.fulfillments.count(filter).await?;
        let items = self.fulfillments.list(filter, page).await?;
        Ok((items, total))
    }

    /// Sweep all active fulfillments: forfeit those past the 14-day mark,
    /// count those past the 7-day warning mark. The status-guarded write
    /// means a record already forfeited by a concurrent sweep is skipped,
    /// never double-processed.
    pub async fn process_timeouts(&self, now: OffsetDateTime) -> Result<TimeoutReport, EngineError> {
        let active = self.fulfillments.find_active().await?;
        let mut report = TimeoutReport::default();

        for fulfillment in active {
            if fulfillment.forfeit_due(now) {
                match self
                    .forfeit(fulfillment.id, "14-day confirmation timeout", now)
                    .await
                {
                    Ok(_) => report.forfeited += 1,
                    Err(e) if e.is_conflict() => {
                        debug!(fulfillment_id = %fulfillment.id, "Forfeit already handled");
                    }
                    Err(e) => return Err(e),
                }
            } else if fulfillment.warning_due(now) {
                report.warnings += 1;
            }
        }

        info!(
            warnings = report.warnings,
            forfeited = report.forfeited,
            "Processed fulfillment timeouts"
        );
        Ok(report)
    }

    async fn transition(
        &self,
        id: Uuid,
        target: FulfillmentStatus,
        apply: impl FnOnce(&mut Fulfillment),
    ) -> Result<Fulfillment, EngineError> {
        let current = self.load(id).await?;

        if !current.status.can_transition_to(target) {
            return Err(EngineError::InvalidTransition {
                entity: "fulfillment",
                from: current.status.to_string(),
                to: target.to_string(),
            });
        }

        let from = current.status;
        let mut updated = current;
        updated.status = target;
        apply(&mut updated);

        if !self.fulfillments.update_if_status(&updated, from).await? {
            return Err(EngineError::RaceLost {
                entity: "fulfillment",
                id,
            });
        }

        info!(fulfillment_id = %id, from = %from, to = %target, "Fulfillment transitioned");
        events::emit(
            self.notifier.as_ref(),
            Notification::FulfillmentStatusChanged {
                fulfillment_id: id,
                user_id: updated.user_id,
                new_status: target,
            },
        );
        Ok(updated)
    }

    async fn load(&self, id: Uuid) -> Result<Fulfillment, EngineError> {
        self.fulfillments
            .find_by_id(id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "fulfillment",
                id,
            })
    }
}
