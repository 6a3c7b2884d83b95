//! Ticket purchase service.
//!
//! Validates a purchase against drawing state and the sales window, debits
//! the point ledger atomically, and issues ticket rows. The ticket rows and
//! the drawing counter are written as one transactional store operation; a
//! precondition failure leaves no trace at all.

use crate::entities::{DrawingStatus, Ticket};
use crate::error::EngineError;
use crate::ledger::{LedgerError, LedgerGateway};
use crate::store::{DrawingStore, TicketStore};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

pub const MAX_TICKETS_PER_PURCHASE: u32 = 100;

/// Summary returned to the caller after a successful purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub purchase_id: Uuid,
    pub drawing_id: Uuid,
    pub user_id: Uuid,
    pub tickets: Vec<Ticket>,
    pub unit_cost: i64,
    pub total_cost: i64,
    pub new_balance: i64,
}

pub struct PurchaseService {
    drawings: Arc<dyn DrawingStore>,
    tickets: Arc<dyn TicketStore>,
    ledger: Arc<dyn LedgerGateway>,
}

impl PurchaseService {
    pub fn new(
        drawings: Arc<dyn DrawingStore>,
        tickets: Arc<dyn TicketStore>,
        ledger: Arc<dyn LedgerGateway>,
    ) -> Self {
        Self {
            drawings,
            tickets,
            ledger,
        }
    }

    /// Buy `quantity` tickets for `user_id` in one atomic purchase.
    pub async fn purchase(
        &self,
        user_id: Uuid,
        drawing_id: Uuid,
        quantity: u32,
        now: OffsetDateTime,
    ) -> Result<PurchaseReceipt, EngineError> {
        if quantity < 1 || quantity > MAX_TICKETS_PER_PURCHASE {
            return Err(EngineError::Validation(format!(
                "quantity must be between 1 and {MAX_TICKETS_PER_PURCHASE}"
            )));
        }

        let drawing = self
            .drawings
            .find_by_id(drawing_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "drawing",
                id: drawing_id,
            })?;

        if drawing.status != DrawingStatus::Open {
            return Err(EngineError::WrongStatus {
                required: DrawingStatus::Open,
                actual: drawing.status,
            });
        }
        if let Some(sales_close) = drawing.sales_close
            && now >= sales_close
        {
            return Err(EngineError::Validation(
                "ticket sales have closed for this drawing".into(),
            ));
        }

        let total_cost = drawing.ticket_cost * quantity as i64;

        // Fresh read; the debit below re-verifies atomically.
        let balance = self.ledger.balance(user_id).await.map_err(ledger_err)?;
        if balance < total_cost {
            return Err(EngineError::InsufficientBalance {
                required: total_cost,
                available: balance,
            });
        }

        let reference = format!("ticket_purchase:{drawing_id}");
        let receipt = self
            .ledger
            .debit(user_id, total_cost, &reference)
            .await
            .map_err(ledger_err)?;

        let tickets: Vec<Ticket> = (0..quantity)
            .map(|_| Ticket::issue(drawing_id, user_id, receipt.transaction_id, now))
            .collect();

        // The debit has landed; a failure past this point means points were
        // taken without tickets and needs operator reconciliation.
        if let Err(e) = self.tickets.record_purchase(&tickets).await {
            error!(
                %user_id,
                %drawing_id,
                transaction_id = %receipt.transaction_id,
                error = %e,
                "Debit committed but ticket rows failed, manual reconciliation required"
            );
            return Err(EngineError::Persistence(e));
        }

        info!(
            %user_id,
            %drawing_id,
            quantity,
            total_cost,
            "Tickets purchased"
        );

        Ok(PurchaseReceipt {
            purchase_id: receipt.transaction_id,
            drawing_id,
            user_id,
            tickets,
            unit_cost: drawing.ticket_cost,
            total_cost,
            new_balance: receipt.new_balance,
        })
    }

    /// Tickets a user holds in one drawing.
    pub async fn user_tickets(
        &self,
        user_id: Uuid,
        drawing_id: Uuid,
    ) -> Result<Vec<Ticket>, EngineError> {
        Ok(self.tickets.find_by_user(drawing_id, user_id).await?)
    }
}

fn ledger_err(e: LedgerError) -> EngineError {
    match e {
        LedgerError::InsufficientFunds {
            required,
            available,
        } => EngineError::InsufficientBalance {
            required,
            available,
        },
        LedgerError::Store(e) => EngineError::Persistence(e),
    }
}
