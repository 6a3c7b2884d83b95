//! Drawing lifecycle manager.
//!
//! Enforces the one-way status state machine. Every persisted transition is
//! the conditional "from -> to" store primitive, so an operator action and a
//! worker sweep racing for the same edge cannot both succeed.

use crate::entities::{Drawing, DrawingStatus, NewDrawing};
use crate::error::EngineError;
use crate::store::{DrawingFilter, DrawingStore, Page};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

pub struct LifecycleService {
    drawings: Arc<dyn DrawingStore>,
}

impl LifecycleService {
    pub fn new(drawings: Arc<dyn DrawingStore>) -> Self {
        Self { drawings }
    }

    /// Create a drawing in `Draft`.
    pub async fn create(
        &self,
        new: NewDrawing,
        now: OffsetDateTime,
    ) -> Result<Drawing, EngineError> {
        if new.name.trim().is_empty() {
            return Err(EngineError::Validation("drawing name is required".into()));
        }
        let drawing = Drawing::from_new(new, now);
        self.drawings.create(&drawing).await?;
        info!(drawing_id = %drawing.id, kind = %drawing.kind, "Created drawing");
        Ok(drawing)
    }

    /// Move a drawing to `target`, enforcing the transition table.
    pub async fn transition(
        &self,
        drawing_id: Uuid,
        target: DrawingStatus,
        now: OffsetDateTime,
    ) -> Result<Drawing, EngineError> {
        let mut drawing = self.load(drawing_id).await?;

        if !drawing.status.can_transition_to(target) {
            return Err(EngineError::InvalidTransition {
                entity: "drawing",
                from: drawing.status.to_string(),
                to: target.to_string(),
            });
        }
        if target == DrawingStatus::Scheduled && drawing.draw_time.is_none() {
            return Err(EngineError::Validation(
                "cannot schedule a drawing without a draw time".into(),
            ));
        }

        let applied = if target == DrawingStatus::Completed {
            self.drawings.complete(drawing_id, now, None, None).await?
        } else {
            self.drawings
                .transition_status(drawing_id, drawing.status, target)
                .await?
        };
        if !applied {
            // Another caller moved the drawing first.
            return Err(EngineError::RaceLost {
                entity: "drawing",
                id: drawing_id,
            });
        }

        info!(%drawing_id, from = %drawing.status, to = %target, "Drawing transitioned");
        drawing.status = target;
        if target == DrawingStatus::Completed {
            drawing.completed_at = Some(now);
        }
        Ok(drawing)
    }

    pub async fn schedule(
        &self,
        drawing_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Drawing, EngineError> {
        self.transition(drawing_id, DrawingStatus::Scheduled, now).await
    }

    pub async fn open(
        &self,
        drawing_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Drawing, EngineError> {
        self.transition(drawing_id, DrawingStatus::Open, now).await
    }

    pub async fn close(
        &self,
        drawing_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Drawing, EngineError> {
        self.transition(drawing_id, DrawingStatus::Closed, now).await
    }

    pub async fn cancel(
        &self,
        drawing_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<Drawing, EngineError> {
        self.transition(drawing_id, DrawingStatus::Cancelled, now).await
    }

    pub async fn get(&self, drawing_id: Uuid) -> Result<Drawing, EngineError> {
        self.load(drawing_id).await
    }

    pub async fn list(
        &self,
        filter: DrawingFilter,
        page: Page,
    ) -> Result<(Vec<Drawing>, u64), EngineError> {
        let total = self.drawings.count(filter).await?;
        let items = self.drawings.list(filter, page).await?;
        Ok((items, total))
    }

    async fn load(&self, drawing_id: Uuid) -> Result<Drawing, EngineError> {
        self.drawings
            .find_by_id(drawing_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "drawing",
                id: drawing_id,
            })
    }
}
