//! Persistence seams for the engine.
//!
//! Each entity gets a store trait; services receive them by constructor
//! injection, never through globals. Conditional updates ("write only if the
//! row is still in the observed state") are the primitives the concurrency
//! model in the services is built on: they return `bool` and a `false` means
//! a concurrent caller won the race.

pub mod memory;
pub mod postgres;

use crate::entities::{
    Drawing, DrawingKind, DrawingStatus, Fulfillment, FulfillmentStatus, Prize, Ticket,
};
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub use memory::MemoryStores;
pub use postgres::PgStores;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Pagination window for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DrawingFilter {
    pub status: Option<DrawingStatus>,
    pub kind: Option<DrawingKind>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FulfillmentFilter {
    pub user_id: Option<Uuid>,
    pub drawing_id: Option<Uuid>,
    pub status: Option<FulfillmentStatus>,
}

#[async_trait]
pub trait DrawingStore: Send + Sync {
    async fn create(&self, drawing: &Drawing) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Drawing>, StoreError>;

    async fn find_by_status(&self, status: DrawingStatus) -> Result<Vec<Drawing>, StoreError>;

    async fn list(&self, filter: DrawingFilter, page: Page) -> Result<Vec<Drawing>, StoreError>;

    async fn count(&self, filter: DrawingFilter) -> Result<u64, StoreError>;

    /// Set status to `to` only if the current status is still `from`.
    async fn transition_status(
        &self,
        id: Uuid,
        from: DrawingStatus,
        to: DrawingStatus,
    ) -> Result<bool, StoreError>;

    /// Claim `Closed -> Completed` in one conditional write, stamping the
    /// completion metadata. `false` means another execution already claimed
    /// the drawing.
    async fn complete(
        &self,
        id: Uuid,
        completed_at: OffsetDateTime,
        seed_hash: Option<String>,
        total_tickets: Option<u32>,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a batch of freshly purchased tickets and bump the owning
    /// drawing's ticket counter as one transactional unit. All tickets must
    /// reference the same drawing.
    async fn record_purchase(&self, tickets: &[Ticket]) -> Result<(), StoreError>;

    async fn find_by_drawing(&self, drawing_id: Uuid) -> Result<Vec<Ticket>, StoreError>;

    async fn find_by_user(
        &self,
        drawing_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Ticket>, StoreError>;

    async fn count_by_drawing(&self, drawing_id: Uuid) -> Result<u64, StoreError>;

    /// Write winner flag, prize, and snapshot number for a winning ticket.
    async fn mark_winner(&self, id: Uuid, prize_id: Uuid, number: u32) -> Result<(), StoreError>;

    /// Backfill the snapshot number on a non-winning ticket.
    async fn set_number(&self, id: Uuid, number: u32) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PrizeStore: Send + Sync {
    async fn create(&self, prize: &Prize) -> Result<(), StoreError>;

    /// Prizes for a drawing, rank ascending.
    async fn find_by_drawing(&self, drawing_id: Uuid) -> Result<Vec<Prize>, StoreError>;
}

#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    async fn create(&self, fulfillment: &Fulfillment) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Fulfillment>, StoreError>;

    /// All records whose status is not terminal.
    async fn find_active(&self) -> Result<Vec<Fulfillment>, StoreError>;

    async fn list(
        &self,
        filter: FulfillmentFilter,
        page: Page,
    ) -> Result<Vec<Fulfillment>, StoreError>;

    async fn count(&self, filter: FulfillmentFilter) -> Result<u64, StoreError>;

    /// Replace the record with `updated` only if the stored status is still
    /// `expected`. The guard is what makes timeout processing and operator
    /// actions safe to race.
    async fn update_if_status(
        &self,
        updated: &Fulfillment,
        expected: FulfillmentStatus,
    ) -> Result<bool, StoreError>;
}
