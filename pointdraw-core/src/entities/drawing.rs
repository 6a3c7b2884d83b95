use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Ticket sales close this long before the scheduled draw time.
pub const SALES_CLOSE_LEAD: Duration = Duration::minutes(5);

/// One sweepstakes event with its own ticket pool and prizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: Uuid,
    pub kind: DrawingKind,
    pub name: String,
    pub description: Option<String>,
    /// Price of one ticket, in points.
    pub ticket_cost: i64,
    pub draw_time: Option<OffsetDateTime>,
    pub sales_close: Option<OffsetDateTime>,
    pub status: DrawingStatus,
    /// Incrementally maintained; equals the number of ticket rows.
    pub total_tickets: u32,
    pub completed_at: Option<OffsetDateTime>,
    /// SHA-256 digest of the execution seed, stored for audit.
    pub seed_hash: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Parameters for creating a drawing in `Draft` status.
#[derive(Debug, Clone)]
pub struct NewDrawing {
    pub kind: DrawingKind,
    pub name: String,
    pub description: Option<String>,
    /// Defaults to the kind's standard cost when `None`.
    pub ticket_cost: Option<i64>,
    pub draw_time: Option<OffsetDateTime>,
    /// Defaults to `draw_time - SALES_CLOSE_LEAD` when `None`.
    pub sales_close: Option<OffsetDateTime>,
}

impl Drawing {
    pub fn from_new(new: NewDrawing, now: OffsetDateTime) -> Self {
        let ticket_cost = new
            .ticket_cost
            .unwrap_or_else(|| new.kind.default_ticket_cost());
        let sales_close = new
            .sales_close
            .or_else(|| new.draw_time.map(|t| t - SALES_CLOSE_LEAD));
        Self {
            id: Uuid::new_v4(),
            kind: new.kind,
            name: new.name,
            description: new.description,
            ticket_cost,
            draw_time: new.draw_time,
            sales_close,
            status: DrawingStatus::Draft,
            total_tickets: 0,
            completed_at: None,
            seed_hash: None,
            created_at: now,
        }
    }

    /// Whether an open drawing should auto-close, given the lead window.
    pub fn sales_should_close(&self, now: OffsetDateTime) -> bool {
        match (self.status, self.draw_time) {
            (DrawingStatus::Open, Some(draw_time)) => now >= draw_time - SALES_CLOSE_LEAD,
            _ => false,
        }
    }

    /// Whether a closed drawing is past its draw time and ready to execute.
    pub fn ready_to_execute(&self, now: OffsetDateTime) -> bool {
        match (self.status, self.draw_time) {
            (DrawingStatus::Closed, Some(draw_time)) => now >= draw_time,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingKind {
    Daily,
    Weekly,
    Monthly,
    Annual,
}

impl DrawingKind {
    pub fn default_ticket_cost(self) -> i64 {
        match self {
            DrawingKind::Daily => 100,
            DrawingKind::Weekly => 500,
            DrawingKind::Monthly => 2_000,
            DrawingKind::Annual => 10_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DrawingKind::Daily => "daily",
            DrawingKind::Weekly => "weekly",
            DrawingKind::Monthly => "monthly",
            DrawingKind::Annual => "annual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(DrawingKind::Daily),
            "weekly" => Some(DrawingKind::Weekly),
            "monthly" => Some(DrawingKind::Monthly),
            "annual" => Some(DrawingKind::Annual),
            _ => None,
        }
    }
}

impl std::fmt::Display for DrawingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drawing lifecycle status.
///
/// Transitions are one-way; the only back-edge-free escape hatch is
/// cancellation from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingStatus {
    Draft,
    Scheduled,
    Open,
    Closed,
    Completed,
    Cancelled,
}

impl DrawingStatus {
    /// The allowed targets from this status.
    pub fn allowed_targets(self) -> &'static [DrawingStatus] {
        match self {
            DrawingStatus::Draft => &[DrawingStatus::Scheduled, DrawingStatus::Cancelled],
            DrawingStatus::Scheduled => &[DrawingStatus::Open, DrawingStatus::Cancelled],
            DrawingStatus::Open => &[DrawingStatus::Closed, DrawingStatus::Cancelled],
            DrawingStatus::Closed => &[DrawingStatus::Completed, DrawingStatus::Cancelled],
            DrawingStatus::Completed | DrawingStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: DrawingStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DrawingStatus::Draft => "draft",
            DrawingStatus::Scheduled => "scheduled",
            DrawingStatus::Open => "open",
            DrawingStatus::Closed => "closed",
            DrawingStatus::Completed => "completed",
            DrawingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DrawingStatus::Draft),
            "scheduled" => Some(DrawingStatus::Scheduled),
            "open" => Some(DrawingStatus::Open),
            "closed" => Some(DrawingStatus::Closed),
            "completed" => Some(DrawingStatus::Completed),
            "cancelled" => Some(DrawingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for DrawingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const ALL: [DrawingStatus; 6] = [
        DrawingStatus::Draft,
        DrawingStatus::Scheduled,
        DrawingStatus::Open,
        DrawingStatus::Closed,
        DrawingStatus::Completed,
        DrawingStatus::Cancelled,
    ];

    #[test]
    fn transition_table_matches_lifecycle() {
        for from in ALL {
            for to in ALL {
                let expected = match (from, to) {
                    (DrawingStatus::Draft, DrawingStatus::Scheduled)
                    | (DrawingStatus::Scheduled, DrawingStatus::Open)
                    | (DrawingStatus::Open, DrawingStatus::Closed)
                    | (DrawingStatus::Closed, DrawingStatus::Completed) => true,
                    (from, DrawingStatus::Cancelled) => !from.is_terminal(),
                    _ => false,
                };
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        assert!(DrawingStatus::Completed.is_terminal());
        assert!(DrawingStatus::Cancelled.is_terminal());
        assert!(!DrawingStatus::Open.is_terminal());
    }

    #[test]
    fn default_costs_per_kind() {
        assert_eq!(DrawingKind::Daily.default_ticket_cost(), 100);
        assert_eq!(DrawingKind::Weekly.default_ticket_cost(), 500);
        assert_eq!(DrawingKind::Monthly.default_ticket_cost(), 2_000);
        assert_eq!(DrawingKind::Annual.default_ticket_cost(), 10_000);
    }

    #[test]
    fn sales_close_derived_from_draw_time() {
        let draw_time = datetime!(2026-03-01 18:00 UTC);
        let drawing = Drawing::from_new(
            NewDrawing {
                kind: DrawingKind::Daily,
                name: "evening draw".into(),
                description: None,
                ticket_cost: None,
                draw_time: Some(draw_time),
                sales_close: None,
            },
            datetime!(2026-02-28 12:00 UTC),
        );
        assert_eq!(drawing.sales_close, Some(draw_time - SALES_CLOSE_LEAD));
        assert_eq!(drawing.ticket_cost, 100);
        assert_eq!(drawing.status, DrawingStatus::Draft);
    }

    #[test]
    fn auto_close_window() {
        let draw_time = datetime!(2026-03-01 18:00 UTC);
        let mut drawing = Drawing::from_new(
            NewDrawing {
                kind: DrawingKind::Daily,
                name: "d".into(),
                description: None,
                ticket_cost: None,
                draw_time: Some(draw_time),
                sales_close: None,
            },
            datetime!(2026-02-28 12:00 UTC),
        );
        drawing.status = DrawingStatus::Open;

        assert!(!drawing.sales_should_close(datetime!(2026-03-01 17:54 UTC)));
        assert!(drawing.sales_should_close(datetime!(2026-03-01 17:55 UTC)));
        assert!(!drawing.ready_to_execute(datetime!(2026-03-01 18:01 UTC)));

        drawing.status = DrawingStatus::Closed;
        assert!(!drawing.ready_to_execute(datetime!(2026-03-01 17:59 UTC)));
        assert!(drawing.ready_to_execute(datetime!(2026-03-01 18:00 UTC)));
    }
}
