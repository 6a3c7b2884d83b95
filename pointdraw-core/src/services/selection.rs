//! Winner selection engine.
//!
//! Snapshots the ticket pool for a closed drawing, claims the
//! `Closed -> Completed` transition with a single conditional write (the
//! at-most-once guard), then draws winners with a CSPRNG: prizes ascending
//! by rank, one win per user, each pick uniform over the remaining eligible
//! pool.
//!
//! The stored seed hash is tamper evidence that an execution happened, not
//! a replayable seed: the raw seed is discarded immediately and every pick
//! is drawn fresh from the OS-seeded generator.

use crate::entities::{Drawing, DrawingStatus, Fulfillment, Prize};
use crate::error::EngineError;
use crate::events::{self, Notification, NotificationSender};
use crate::store::{DrawingStore, FulfillmentStore, PrizeStore, StoreError, TicketStore};
use itertools::Itertools;
use rand::Rng;
use ring::rand::SecureRandom;
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

/// One winning pick.
#[derive(Debug, Clone)]
pub struct Winner {
    pub ticket_id: Uuid,
    pub ticket_number: u32,
    pub user_id: Uuid,
    pub prize_id: Uuid,
    pub prize_rank: u32,
    pub prize_name: String,
}

/// Outcome of a completed execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub drawing_id: Uuid,
    pub total_tickets: u32,
    pub seed_hash: String,
    pub winners: Vec<Winner>,
    pub fulfillments: Vec<Fulfillment>,
    /// Suppressed non-winner backfill failures; cosmetic, but surfaced.
    pub diagnostics: Vec<String>,
    pub executed_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    ticket_id: Uuid,
    user_id: Uuid,
    number: u32,
}

pub struct SelectionService {
    drawings: Arc<dyn DrawingStore>,
    tickets: Arc<dyn TicketStore>,
    prizes: Arc<dyn PrizeStore>,
    fulfillments: Arc<dyn FulfillmentStore>,
    notifier: Option<NotificationSender>,
}

impl SelectionService {
    pub fn new(
        drawings: Arc<dyn DrawingStore>,
        tickets: Arc<dyn TicketStore>,
        prizes: Arc<dyn PrizeStore>,
        fulfillments: Arc<dyn FulfillmentStore>,
        notifier: Option<NotificationSender>,
    ) -> Self {
        Self {
            drawings,
            tickets,
            prizes,
            fulfillments,
            notifier,
        }
    }

    /// Execute winner selection for a closed drawing. At most one call can
    /// ever run to completion per drawing.
    pub async fn execute(
        &self,
        drawing_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<ExecutionReport, EngineError> {
        let drawing = self
            .drawings
            .find_by_id(drawing_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "drawing",
                id: drawing_id,
            })?;
        self.require_closed(&drawing)?;

        // Reproducible enumeration independent of storage iteration order.
        let snapshot = self.snapshot(drawing_id).await?;
        if snapshot.is_empty() {
            return Err(EngineError::Validation("no tickets to draw from".into()));
        }

        let prizes = self.prizes.find_by_drawing(drawing_id).await?;
        if prizes.is_empty() {
            return Err(EngineError::Validation(
                "no prizes configured for this drawing".into(),
            ));
        }

        let seed_hash = generate_seed_hash()?;
        let total_tickets = snapshot.len() as u32;

        // Claim the drawing before committing any result. Zero rows affected
        // means another execution (worker or operator retry) got here first.
        let claimed = self
            .drawings
            .complete(
                drawing_id,
                now,
                Some(seed_hash.clone()),
                Some(total_tickets),
            )
            .await?;
        if !claimed {
            return match self.drawings.find_by_id(drawing_id).await? {
                Some(d) if d.status == DrawingStatus::Completed => {
                    Err(EngineError::AlreadyExecuted { drawing_id })
                }
                Some(d) => Err(EngineError::WrongStatus {
                    required: DrawingStatus::Closed,
                    actual: d.status,
                }),
                None => Err(EngineError::NotFound {
                    entity: "drawing",
                    id: drawing_id,
                }),
            };
        }

        let winners = select_winners(&snapshot, &prizes);

        // Winner rows and fulfillments are correctness-critical: any failure
        // here surfaces for manual reconciliation, never silently.
        let mut fulfillments = Vec::with_capacity(winners.len());
        for winner in &winners {
            self.tickets
                .mark_winner(winner.ticket_id, winner.prize_id, winner.ticket_number)
                .await?;
            let fulfillment = Fulfillment::pending(
                winner.ticket_id,
                winner.prize_id,
                drawing_id,
                winner.user_id,
                now,
            );
            self.fulfillments.create(&fulfillment).await?;
            fulfillments.push(fulfillment);
        }

        // Non-winner numbers are audit cosmetics; failures are collected,
        // not fatal.
        let winner_tickets: HashSet<Uuid> = winners.iter().map(|w| w.ticket_id).collect();
        let mut diagnostics = Vec::new();
        for entry in &snapshot {
            if winner_tickets.contains(&entry.ticket_id) {
                continue;
            }
            if let Err(e) = self.tickets.set_number(entry.ticket_id, entry.number).await {
                warn!(
                    ticket_id = %entry.ticket_id,
                    error = %e,
                    "Failed to backfill ticket number"
                );
                diagnostics.push(format!(
                    "ticket {} number backfill failed: {e}",
                    entry.ticket_id
                ));
            }
        }

        events::emit(
            self.notifier.as_ref(),
            Notification::DrawingCompleted {
                drawing_id,
                winner_count: winners.len() as u32,
                total_tickets,
            },
        );

        info!(
            %drawing_id,
            total_tickets,
            winner_count = winners.len(),
            "Drawing executed"
        );

        Ok(ExecutionReport {
            drawing_id,
            total_tickets,
            seed_hash,
            winners,
            fulfillments,
            diagnostics,
            executed_at: now,
        })
    }

    fn require_closed(&self, drawing: &Drawing) -> Result<(), EngineError> {
        match drawing.status {
            DrawingStatus::Closed => Ok(()),
            DrawingStatus::Completed => Err(EngineError::AlreadyExecuted {
                drawing_id: drawing.id,
            }),
            actual => Err(EngineError::WrongStatus {
                required: DrawingStatus::Closed,
                actual,
            }),
        }
    }

    /// Load all tickets, order them by ticket id (stable and content
    /// derived), and number them 1..=N.
    async fn snapshot(&self, drawing_id: Uuid) -> Result<Vec<SnapshotEntry>, EngineError> {
        let tickets = self.tickets.find_by_drawing(drawing_id).await?;
        Ok(tickets
            .into_iter()
            .sorted_by_key(|t| t.id)
            .enumerate()
            .map(|(i, t)| SnapshotEntry {
                ticket_id: t.id,
                user_id: t.user_id,
                number: (i + 1) as u32,
            })
            .collect())
    }
}

/// Draw winners from the snapshot.
///
/// Prizes are awarded rank ascending. A user wins at most once per drawing;
/// when the eligible pool runs dry the prize's remaining units simply go
/// unawarded.
fn select_winners(snapshot: &[SnapshotEntry], prizes: &[Prize]) -> Vec<Winner> {
    let mut rng = rand::rng();
    let mut available: Vec<&SnapshotEntry> = snapshot.iter().collect();
    let mut winning_users: HashSet<Uuid> = HashSet::new();
    let mut winners = Vec::new();

    for prize in prizes {
        for _ in 0..prize.quantity {
            let eligible: Vec<usize> = available
                .iter()
                .enumerate()
                .filter(|(_, e)| !winning_users.contains(&e.user_id))
                .map(|(i, _)| i)
                .collect();
            if eligible.is_empty() {
                warn!(prize_id = %prize.id, "Eligible pool exhausted, prize units unawarded");
                break;
            }

            let pick = eligible[rng.random_range(0..eligible.len())];
            let entry = available.swap_remove(pick);
            winning_users.insert(entry.user_id);
            winners.push(Winner {
                ticket_id: entry.ticket_id,
                ticket_number: entry.number,
                user_id: entry.user_id,
                prize_id: prize.id,
                prize_rank: prize.rank,
                prize_name: prize.name.clone(),
            });
        }
    }

    winners
}

/// Generate the per-execution audit artifact: 32 bytes from the OS CSPRNG,
/// kept only as a SHA-256 hex digest. The raw seed never leaves this
/// function.
fn generate_seed_hash() -> Result<String, EngineError> {
    let rng = ring::rand::SystemRandom::new();
    let mut seed = [0u8; 32];
    rng.fill(&mut seed)
        .map_err(|_| EngineError::Persistence(StoreError::Backend("entropy source unavailable".into())))?;
    let digest = ring::digest::digest(&ring::digest::SHA256, &seed);
    Ok(to_hex(digest.as_ref()))
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
