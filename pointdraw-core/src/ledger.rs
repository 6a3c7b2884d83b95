//! Ledger gateway — the engine's view of the external points ledger.
//!
//! The engine never mutates balances directly; it asks the gateway for an
//! atomic debit. The debit must verify sufficient balance and apply the
//! delta in one step — a read-then-write sequence is not an acceptable
//! implementation of this trait.

use crate::store::StoreError;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a successful debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitReceipt {
    pub transaction_id: Uuid,
    pub new_balance: i64,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Current balance; unknown accounts read as zero.
    async fn balance(&self, user_id: Uuid) -> Result<i64, LedgerError>;

    /// Atomically verify `amount` is covered and subtract it, recording a
    /// signed entry tagged with `reference`.
    async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: &str,
    ) -> Result<DebitReceipt, LedgerError>;
}

// ---------------------------------------------------------------------------
// In-memory ledger
// ---------------------------------------------------------------------------

/// A recorded balance mutation, kept for inspection in tests.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub resulting_balance: i64,
    pub reference: String,
}

/// Mutex-guarded ledger; the lock makes check-and-debit a single step.
#[derive(Default)]
pub struct MemoryLedger {
    accounts: Mutex<HashMap<Uuid, i64>>,
    entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn credit(&self, user_id: Uuid, amount: i64) {
        let mut accounts = self.accounts.lock().await;
        *accounts.entry(user_id).or_insert(0) += amount;
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl LedgerGateway for MemoryLedger {
    async fn balance(&self, user_id: Uuid) -> Result<i64, LedgerError> {
        Ok(self.accounts.lock().await.get(&user_id).copied().unwrap_or(0))
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: &str,
    ) -> Result<DebitReceipt, LedgerError> {
        let mut accounts = self.accounts.lock().await;
        let balance = accounts.entry(user_id).or_insert(0);
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        let receipt = DebitReceipt {
            transaction_id: Uuid::new_v4(),
            new_balance: *balance,
        };
        self.entries.lock().await.push(LedgerEntry {
            transaction_id: receipt.transaction_id,
            user_id,
            amount: -amount,
            resulting_balance: receipt.new_balance,
            reference: reference.to_string(),
        });
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// Postgres ledger
// ---------------------------------------------------------------------------

/// Postgres-backed ledger adapter.
///
/// The debit is a single conditional `UPDATE ... WHERE balance >= amount`,
/// so two racing purchases can never both pass a stale balance check.
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerGateway for PgLedger {
    async fn balance(&self, user_id: Uuid) -> Result<i64, LedgerError> {
        let row = sqlx::query("SELECT balance FROM point_balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some(row) => Ok(row.try_get::<i64, _>("balance").map_err(StoreError::from)?),
            None => Ok(0),
        }
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: &str,
    ) -> Result<DebitReceipt, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let row = sqlx::query(
            "UPDATE point_balances SET balance = balance - $2 \
             WHERE user_id = $1 AND balance >= $2 \
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        let Some(row) = row else {
            // Lost the conditional update: report the authoritative balance.
            tx.rollback().await.map_err(StoreError::from)?;
            let available = self.balance(user_id).await?;
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available,
            });
        };

        let new_balance: i64 = row.try_get("balance").map_err(StoreError::from)?;
        let transaction_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO ledger_entries \
             (id, user_id, amount, resulting_balance, reference, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(transaction_id)
        .bind(user_id)
        .bind(-amount)
        .bind(new_balance)
        .bind(reference)
        .bind(OffsetDateTime::now_utc())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;

        Ok(DebitReceipt {
            transaction_id,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn debit_is_all_or_nothing() {
        let ledger = MemoryLedger::new();
        let user = Uuid::new_v4();
        ledger.credit(user, 500).await;

        let receipt = ledger.debit(user, 200, "purchase:a").await.unwrap();
        assert_eq!(receipt.new_balance, 300);

        let err = ledger.debit(user, 400, "purchase:b").await.unwrap_err();
        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, 400);
                assert_eq!(available, 300);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Failed debit left no trace.
        assert_eq!(ledger.balance(user).await.unwrap(), 300);
        assert_eq!(ledger.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_account_reads_zero() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.balance(Uuid::new_v4()).await.unwrap(), 0);
    }
}
