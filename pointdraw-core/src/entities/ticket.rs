use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One unit of entry into a drawing, bought with points.
///
/// `number` stays unset until winner selection assigns the 1..=N
/// enumeration; `winner` and `prize_id` are written exactly once, by the
/// selection engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub drawing_id: Uuid,
    pub user_id: Uuid,
    /// Ledger transaction that paid for this ticket.
    pub purchase_id: Uuid,
    pub number: Option<u32>,
    pub winner: bool,
    pub prize_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl Ticket {
    pub fn issue(
        drawing_id: Uuid,
        user_id: Uuid,
        purchase_id: Uuid,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            drawing_id,
            user_id,
            purchase_id,
            number: None,
            winner: false,
            prize_id: None,
            created_at: now,
        }
    }
}
