//! Postgres store backend.
//!
//! One struct over a shared `PgPool` implements every store trait. Status
//! enums are stored as text and parsed on the way out; the conditional
//! update primitives are plain `UPDATE ... WHERE` guards so concurrency
//! safety does not depend on advisory locks.

use super::{
    DrawingFilter, DrawingStore, FulfillmentFilter, FulfillmentStore, Page, PrizeStore,
    StoreError, TicketStore,
};
use crate::entities::{
    Drawing, DrawingKind, DrawingStatus, Fulfillment, FulfillmentStatus, Prize, ShippingAddress,
    Ticket,
};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_drawing_status(s: &str) -> Result<DrawingStatus, StoreError> {
    DrawingStatus::parse(s).ok_or_else(|| StoreError::Backend(format!("bad drawing status: {s}")))
}

fn parse_drawing_kind(s: &str) -> Result<DrawingKind, StoreError> {
    DrawingKind::parse(s).ok_or_else(|| StoreError::Backend(format!("bad drawing kind: {s}")))
}

fn parse_fulfillment_status(s: &str) -> Result<FulfillmentStatus, StoreError> {
    FulfillmentStatus::parse(s)
        .ok_or_else(|| StoreError::Backend(format!("bad fulfillment status: {s}")))
}

fn drawing_from_row(row: &PgRow) -> Result<Drawing, StoreError> {
    Ok(Drawing {
        id: row.try_get("id")?,
        kind: parse_drawing_kind(&row.try_get::<String, _>("kind")?)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        ticket_cost: row.try_get("ticket_cost")?,
        draw_time: row.try_get("draw_time")?,
        sales_close: row.try_get("sales_close")?,
        status: parse_drawing_status(&row.try_get::<String, _>("status")?)?,
        total_tickets: row.try_get::<i64, _>("total_tickets")? as u32,
        completed_at: row.try_get("completed_at")?,
        seed_hash: row.try_get("seed_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, StoreError> {
    Ok(Ticket {
        id: row.try_get("id")?,
        drawing_id: row.try_get("drawing_id")?,
        user_id: row.try_get("user_id")?,
        purchase_id: row.try_get("purchase_id")?,
        number: row.try_get::<Option<i64>, _>("number")?.map(|n| n as u32),
        winner: row.try_get("winner")?,
        prize_id: row.try_get("prize_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn prize_from_row(row: &PgRow) -> Result<Prize, StoreError> {
    Ok(Prize {
        id: row.try_get("id")?,
        drawing_id: row.try_get("drawing_id")?,
        rank: row.try_get::<i32, _>("rank")? as u32,
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn fulfillment_from_row(row: &PgRow) -> Result<Fulfillment, StoreError> {
    let street: Option<String> = row.try_get("addr_street")?;
    let address = match street {
        Some(street) => Some(ShippingAddress {
            street,
            city: row.try_get::<Option<String>, _>("addr_city")?.unwrap_or_default(),
            state: row.try_get::<Option<String>, _>("addr_state")?.unwrap_or_default(),
            zip: row.try_get::<Option<String>, _>("addr_zip")?.unwrap_or_default(),
        }),
        None => None,
    };
    Ok(Fulfillment {
        id: row.try_get("id")?,
        ticket_id: row.try_get("ticket_id")?,
        prize_id: row.try_get("prize_id")?,
        drawing_id: row.try_get("drawing_id")?,
        user_id: row.try_get("user_id")?,
        status: parse_fulfillment_status(&row.try_get::<String, _>("status")?)?,
        address,
        carrier: row.try_get("carrier")?,
        tracking: row.try_get("tracking")?,
        notified_at: row.try_get("notified_at")?,
        address_confirmed_at: row.try_get("address_confirmed_at")?,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
        forfeited_at: row.try_get("forfeited_at")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

const DRAWING_COLS: &str = "id, kind, name, description, ticket_cost, draw_time, sales_close, \
     status, total_tickets, completed_at, seed_hash, created_at";

const TICKET_COLS: &str =
    "id, drawing_id, user_id, purchase_id, number, winner, prize_id, created_at";

const FULFILLMENT_COLS: &str = "id, ticket_id, prize_id, drawing_id, user_id, status, \
     addr_street, addr_city, addr_state, addr_zip, carrier, tracking, \
     notified_at, address_confirmed_at, shipped_at, delivered_at, forfeited_at, \
     notes, created_at";

#[async_trait]
impl DrawingStore for PgStores {
    async fn create(&self, drawing: &Drawing) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO drawings \
             (id, kind, name, description, ticket_cost, draw_time, sales_close, \
              status, total_tickets, completed_at, seed_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(drawing.id)
        .bind(drawing.kind.as_str())
        .bind(&drawing.name)
        .bind(&drawing.description)
        .bind(drawing.ticket_cost)
        .bind(drawing.draw_time)
        .bind(drawing.sales_close)
        .bind(drawing.status.as_str())
        .bind(drawing.total_tickets as i64)
        .bind(drawing.completed_at)
        .bind(&drawing.seed_hash)
        .bind(drawing.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Drawing>, StoreError> {
        let row = sqlx::query(&format!("SELECT {DRAWING_COLS} FROM drawings WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(drawing_from_row).transpose()
    }

    async fn find_by_status(&self, status: DrawingStatus) -> Result<Vec<Drawing>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {DRAWING_COLS} FROM drawings WHERE status = $1 ORDER BY created_at, id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(drawing_from_row).collect()
    }

    async fn list(&self, filter: DrawingFilter, page: Page) -> Result<Vec<Drawing>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {DRAWING_COLS} FROM drawings \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR kind = $2) \
             ORDER BY created_at, id LIMIT $3 OFFSET $4"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(drawing_from_row).collect()
    }

    async fn count(&self, filter: DrawingFilter) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM drawings \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR kind = $2)",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.kind.map(|k| k.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: DrawingStatus,
        to: DrawingStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE drawings SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete(
        &self,
        id: Uuid,
        completed_at: OffsetDateTime,
        seed_hash: Option<String>,
        total_tickets: Option<u32>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE drawings SET \
               status = 'completed', \
               completed_at = $2, \
               seed_hash = COALESCE($3, seed_hash), \
               total_tickets = COALESCE($4, total_tickets) \
             WHERE id = $1 AND status = 'closed'",
        )
        .bind(id)
        .bind(completed_at)
        .bind(seed_hash)
        .bind(total_tickets.map(|t| t as i64))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl TicketStore for PgStores {
    async fn record_purchase(&self, tickets: &[Ticket]) -> Result<(), StoreError> {
        let Some(first) = tickets.first() else {
            return Ok(());
        };
        let mut tx = self.pool.begin().await?;
        for ticket in tickets {
            sqlx::query(
                "INSERT INTO tickets \
                 (id, drawing_id, user_id, purchase_id, number, winner, prize_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(ticket.id)
            .bind(ticket.drawing_id)
            .bind(ticket.user_id)
            .bind(ticket.purchase_id)
            .bind(ticket.number.map(|n| n as i64))
            .bind(ticket.winner)
            .bind(ticket.prize_id)
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("UPDATE drawings SET total_tickets = total_tickets + $2 WHERE id = $1")
            .bind(first.drawing_id)
            .bind(tickets.len() as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_drawing(&self, drawing_id: Uuid) -> Result<Vec<Ticket>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLS} FROM tickets WHERE drawing_id = $1"
        ))
        .bind(drawing_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(ticket_from_row).collect()
    }

    async fn find_by_user(
        &self,
        drawing_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Ticket>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLS} FROM tickets WHERE drawing_id = $1 AND user_id = $2"
        ))
        .bind(drawing_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(ticket_from_row).collect()
    }

    async fn count_by_drawing(&self, drawing_id: Uuid) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM tickets WHERE drawing_id = $1")
            .bind(drawing_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn mark_winner(&self, id: Uuid, prize_id: Uuid, number: u32) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE tickets SET winner = TRUE, prize_id = $2, number = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(prize_id)
        .bind(number as i64)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("ticket {id} missing")));
        }
        Ok(())
    }

    async fn set_number(&self, id: Uuid, number: u32) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE tickets SET number = $2 WHERE id = $1")
            .bind(id)
            .bind(number as i64)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("ticket {id} missing")));
        }
        Ok(())
    }
}

#[async_trait]
impl PrizeStore for PgStores {
    async fn create(&self, prize: &Prize) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO prizes (id, drawing_id, rank, quantity, name, description) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(prize.id)
        .bind(prize.drawing_id)
        .bind(prize.rank as i32)
        .bind(prize.quantity as i32)
        .bind(&prize.name)
        .bind(&prize.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_drawing(&self, drawing_id: Uuid) -> Result<Vec<Prize>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, drawing_id, rank, quantity, name, description \
             FROM prizes WHERE drawing_id = $1 ORDER BY rank",
        )
        .bind(drawing_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(prize_from_row).collect()
    }
}

#[async_trait]
impl FulfillmentStore for PgStores {
    async fn create(&self, f: &Fulfillment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO fulfillments \
             (id, ticket_id, prize_id, drawing_id, user_id, status, \
              addr_street, addr_city, addr_state, addr_zip, carrier, tracking, \
              notified_at, address_confirmed_at, shipped_at, delivered_at, forfeited_at, \
              notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
                     $13, $14, $15, $16, $17, $18, $19)",
        )
        .bind(f.id)
        .bind(f.ticket_id)
        .bind(f.prize_id)
        .bind(f.drawing_id)
        .bind(f.user_id)
        .bind(f.status.as_str())
        .bind(f.address.as_ref().map(|a| a.street.clone()))
        .bind(f.address.as_ref().map(|a| a.city.clone()))
        .bind(f.address.as_ref().map(|a| a.state.clone()))
        .bind(f.address.as_ref().map(|a| a.zip.clone()))
        .bind(&f.carrier)
        .bind(&f.tracking)
        .bind(f.notified_at)
        .bind(f.address_confirmed_at)
        .bind(f.shipped_at)
        .bind(f.delivered_at)
        .bind(f.forfeited_at)
        .bind(&f.notes)
        .bind(f.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Fulfillment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FULFILLMENT_COLS} FROM fulfillments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(fulfillment_from_row).transpose()
    }

    async fn find_active(&self) -> Result<Vec<Fulfillment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FULFILLMENT_COLS} FROM fulfillments \
             WHERE status NOT IN ('delivered', 'forfeited') ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(fulfillment_from_row).collect()
    }

    async fn list(
        &self,
        filter: FulfillmentFilter,
        page: Page,
    ) -> Result<Vec<Fulfillment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FULFILLMENT_COLS} FROM fulfillments \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
               AND ($2::uuid IS NULL OR drawing_id = $2) \
               AND ($3::text IS NULL OR status = $3) \
             ORDER BY created_at, id LIMIT $4 OFFSET $5"
        ))
        .bind(filter.user_id)
        .bind(filter.drawing_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(fulfillment_from_row).collect()
    }

    async fn count(&self, filter: FulfillmentFilter) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM fulfillments \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
               AND ($2::uuid IS NULL OR drawing_id = $2) \
               AND ($3::text IS NULL OR status = $3)",
        )
        .bind(filter.user_id)
        .bind(filter.drawing_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn update_if_status(
        &self,
        updated: &Fulfillment,
        expected: FulfillmentStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE fulfillments SET \
               status = $3, \
               addr_street = $4, addr_city = $5, addr_state = $6, addr_zip = $7, \
               carrier = $8, tracking = $9, \
               notified_at = $10, address_confirmed_at = $11, shipped_at = $12, \
               delivered_at = $13, forfeited_at = $14, notes = $15 \
             WHERE id = $1 AND status = $2",
        )
        .bind(updated.id)
        .bind(expected.as_str())
        .bind(updated.status.as_str())
        .bind(updated.address.as_ref().map(|a| a.street.clone()))
        .bind(updated.address.as_ref().map(|a| a.city.clone()))
        .bind(updated.address.as_ref().map(|a| a.state.clone()))
        .bind(updated.address.as_ref().map(|a| a.zip.clone()))
        .bind(&updated.carrier)
        .bind(&updated.tracking)
        .bind(updated.notified_at)
        .bind(updated.address_confirmed_at)
        .bind(updated.shipped_at)
        .bind(updated.delivered_at)
        .bind(updated.forfeited_at)
        .bind(&updated.notes)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
