//! Event type definitions.

use crate::entities::FulfillmentStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events handed to the external notification dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Winner selection finished for a drawing.
    DrawingCompleted {
        drawing_id: Uuid,
        winner_count: u32,
        total_tickets: u32,
    },
    /// A fulfillment record moved to a new status.
    FulfillmentStatusChanged {
        fulfillment_id: Uuid,
        user_id: Uuid,
        new_status: FulfillmentStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_tagged_snake_case() {
        let n = Notification::DrawingCompleted {
            drawing_id: Uuid::nil(),
            winner_count: 2,
            total_tickets: 10,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "drawing_completed");
        assert_eq!(json["winner_count"], 2);

        let n = Notification::FulfillmentStatusChanged {
            fulfillment_id: Uuid::nil(),
            user_id: Uuid::nil(),
            new_status: FulfillmentStatus::WinnerNotified,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "fulfillment_status_changed");
        assert_eq!(json["new_status"], "winner_notified");
    }
}
