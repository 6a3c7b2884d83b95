//! In-memory store backend.
//!
//! Mutex-guarded maps behind the same traits as the Postgres backend. Used
//! by the test suites and for embedding the engine without a database. The
//! `fail_*` toggles let tests inject persistence failures on specific
//! operations.

use super::{
    DrawingFilter, DrawingStore, FulfillmentFilter, FulfillmentStore, Page, PrizeStore,
    StoreError, TicketStore,
};
use crate::entities::{
    Drawing, DrawingStatus, Fulfillment, FulfillmentStatus, Prize, Ticket,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStores {
    drawings: Mutex<HashMap<Uuid, Drawing>>,
    tickets: Mutex<HashMap<Uuid, Ticket>>,
    prizes: Mutex<HashMap<Uuid, Prize>>,
    fulfillments: Mutex<HashMap<Uuid, Fulfillment>>,
    /// When set, `set_number` fails; exercises the best-effort backfill path.
    pub fail_set_number: AtomicBool,
    /// When set, `mark_winner` fails; exercises the fatal commit path.
    pub fail_mark_winner: AtomicBool,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}

fn drawing_matches(drawing: &Drawing, filter: &DrawingFilter) -> bool {
    filter.status.is_none_or(|s| drawing.status == s)
        && filter.kind.is_none_or(|k| drawing.kind == k)
}

fn fulfillment_matches(f: &Fulfillment, filter: &FulfillmentFilter) -> bool {
    filter.user_id.is_none_or(|u| f.user_id == u)
        && filter.drawing_id.is_none_or(|d| f.drawing_id == d)
        && filter.status.is_none_or(|s| f.status == s)
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> Vec<T> {
    let offset = page.offset as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    let mut tail = items.split_off(offset);
    tail.truncate(page.limit as usize);
    tail
}

#[async_trait]
impl DrawingStore for MemoryStores {
    async fn create(&self, drawing: &Drawing) -> Result<(), StoreError> {
        self.drawings
            .lock()
            .await
            .insert(drawing.id, drawing.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Drawing>, StoreError> {
        Ok(self.drawings.lock().await.get(&id).cloned())
    }

    async fn find_by_status(&self, status: DrawingStatus) -> Result<Vec<Drawing>, StoreError> {
        Ok(self
            .drawings
            .lock()
            .await
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect())
    }

    async fn list(&self, filter: DrawingFilter, page: Page) -> Result<Vec<Drawing>, StoreError> {
        let mut items: Vec<Drawing> = self
            .drawings
            .lock()
            .await
            .values()
            .filter(|d| drawing_matches(d, &filter))
            .cloned()
            .collect();
        items.sort_by_key(|d| (d.created_at, d.id));
        Ok(paginate(items, page))
    }

    async fn count(&self, filter: DrawingFilter) -> Result<u64, StoreError> {
        Ok(self
            .drawings
            .lock()
            .await
            .values()
            .filter(|d| drawing_matches(d, &filter))
            .count() as u64)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: DrawingStatus,
        to: DrawingStatus,
    ) -> Result<bool, StoreError> {
        let mut drawings = self.drawings.lock().await;
        match drawings.get_mut(&id) {
            Some(drawing) if drawing.status == from => {
                drawing.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(
        &self,
        id: Uuid,
        completed_at: OffsetDateTime,
        seed_hash: Option<String>,
        total_tickets: Option<u32>,
    ) -> Result<bool, StoreError> {
        let mut drawings = self.drawings.lock().await;
        match drawings.get_mut(&id) {
            Some(drawing) if drawing.status == DrawingStatus::Closed => {
                drawing.status = DrawingStatus::Completed;
                drawing.completed_at = Some(completed_at);
                if seed_hash.is_some() {
                    drawing.seed_hash = seed_hash;
                }
                if let Some(total) = total_tickets {
                    drawing.total_tickets = total;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl TicketStore for MemoryStores {
    async fn record_purchase(&self, tickets: &[Ticket]) -> Result<(), StoreError> {
        let Some(first) = tickets.first() else {
            return Ok(());
        };
        // Hold both locks for the duration, mirroring the SQL transaction.
        let mut drawings = self.drawings.lock().await;
        let mut stored = self.tickets.lock().await;
        let drawing = drawings
            .get_mut(&first.drawing_id)
            .ok_or_else(|| StoreError::Backend(format!("drawing {} missing", first.drawing_id)))?;
        for ticket in tickets {
            stored.insert(ticket.id, ticket.clone());
        }
        drawing.total_tickets += tickets.len() as u32;
        Ok(())
    }

    async fn find_by_drawing(&self, drawing_id: Uuid) -> Result<Vec<Ticket>, StoreError> {
        Ok(self
            .tickets
            .lock()
            .await
            .values()
            .filter(|t| t.drawing_id == drawing_id)
            .cloned()
            .collect())
    }

    async fn find_by_user(
        &self,
        drawing_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Ticket>, StoreError> {
        Ok(self
            .tickets
            .lock()
            .await
            .values()
            .filter(|t| t.drawing_id == drawing_id && t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_by_drawing(&self, drawing_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .tickets
            .lock()
            .await
            .values()
            .filter(|t| t.drawing_id == drawing_id)
            .count() as u64)
    }

    async fn mark_winner(&self, id: Uuid, prize_id: Uuid, number: u32) -> Result<(), StoreError> {
        if self.fail_mark_winner.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("injected mark_winner failure".into()));
        }
        let mut tickets = self.tickets.lock().await;
        let ticket = tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("ticket {id} missing")))?;
        ticket.winner = true;
        ticket.prize_id = Some(prize_id);
        ticket.number = Some(number);
        Ok(())
    }

    async fn set_number(&self, id: Uuid, number: u32) -> Result<(), StoreError> {
        if self.fail_set_number.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("injected set_number failure".into()));
        }
        let mut tickets = self.tickets.lock().await;
        let ticket = tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("ticket {id} missing")))?;
        ticket.number = Some(number);
        Ok(())
    }
}

#[async_trait]
impl PrizeStore for MemoryStores {
    async fn create(&self, prize: &Prize) -> Result<(), StoreError> {
        self.prizes.lock().await.insert(prize.id, prize.clone());
        Ok(())
    }

    async fn find_by_drawing(&self, drawing_id: Uuid) -> Result<Vec<Prize>, StoreError> {
        let mut prizes: Vec<Prize> = self
            .prizes
            .lock()
            .await
            .values()
            .filter(|p| p.drawing_id == drawing_id)
            .cloned()
            .collect();
        prizes.sort_by_key(|p| p.rank);
        Ok(prizes)
    }
}

#[async_trait]
impl FulfillmentStore for MemoryStores {
    async fn create(&self, fulfillment: &Fulfillment) -> Result<(), StoreError> {
        self.fulfillments
            .lock()
            .await
            .insert(fulfillment.id, fulfillment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Fulfillment>, StoreError> {
        Ok(self.fulfillments.lock().await.get(&id).cloned())
    }

    async fn find_active(&self) -> Result<Vec<Fulfillment>, StoreError> {
        Ok(self
            .fulfillments
            .lock()
            .await
            .values()
            .filter(|f| f.status.is_active())
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        filter: FulfillmentFilter,
        page: Page,
    ) -> Result<Vec<Fulfillment>, StoreError> {
        let mut items: Vec<Fulfillment> = self
            .fulfillments
            .lock()
            .await
            .values()
            .filter(|f| fulfillment_matches(f, &filter))
            .cloned()
            .collect();
        items.sort_by_key(|f| (f.created_at, f.id));
        Ok(paginate(items, page))
    }

    async fn count(&self, filter: FulfillmentFilter) -> Result<u64, StoreError> {
        Ok(self
            .fulfillments
            .lock()
            .await
            .values()
            .filter(|f| fulfillment_matches(f, &filter))
            .count() as u64)
    }

    async fn update_if_status(
        &self,
        updated: &Fulfillment,
        expected: FulfillmentStatus,
    ) -> Result<bool, StoreError> {
        let mut fulfillments = self.fulfillments.lock().await;
        match fulfillments.get_mut(&updated.id) {
            Some(stored) if stored.status == expected => {
                *stored = updated.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
