use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Winner has this long after notification to confirm an address before a
/// reminder is due.
pub const CONFIRM_WARNING_AFTER: Duration = Duration::days(7);
/// Hard deadline after notification; past it the prize is forfeited.
pub const CONFIRM_FORFEIT_AFTER: Duration = Duration::days(14);

/// Delivery lifecycle record for one winning ticket's prize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub prize_id: Uuid,
    pub drawing_id: Uuid,
    pub user_id: Uuid,
    pub status: FulfillmentStatus,
    pub address: Option<ShippingAddress>,
    pub carrier: Option<String>,
    pub tracking: Option<String>,
    pub notified_at: Option<OffsetDateTime>,
    pub address_confirmed_at: Option<OffsetDateTime>,
    pub shipped_at: Option<OffsetDateTime>,
    pub delivered_at: Option<OffsetDateTime>,
    pub forfeited_at: Option<OffsetDateTime>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

impl Fulfillment {
    /// Created by the selection engine for each winner, in `Pending`.
    pub fn pending(
        ticket_id: Uuid,
        prize_id: Uuid,
        drawing_id: Uuid,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            prize_id,
            drawing_id,
            user_id,
            status: FulfillmentStatus::Pending,
            address: None,
            carrier: None,
            tracking: None,
            notified_at: None,
            address_confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            forfeited_at: None,
            notes: None,
            created_at: now,
        }
    }

    /// A reminder is due: notified at least 7 days ago and the winner has
    /// still not responded.
    pub fn warning_due(&self, now: OffsetDateTime) -> bool {
        if self.status != FulfillmentStatus::WinnerNotified {
            return false;
        }
        match self.notified_at {
            Some(notified_at) => now >= notified_at + CONFIRM_WARNING_AFTER,
            None => false,
        }
    }

    /// The 14-day deadline has passed while the prize was neither shipped,
    /// delivered, nor already forfeited.
    pub fn forfeit_due(&self, now: OffsetDateTime) -> bool {
        if !self.status.forfeitable_on_timeout() {
            return false;
        }
        match self.notified_at {
            Some(notified_at) => now >= notified_at + CONFIRM_FORFEIT_AFTER,
            None => false,
        }
    }
}

/// Structured shipping address; all fields are required for confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl ShippingAddress {
    /// Names of blank fields, empty when the address is complete.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.street.trim().is_empty() {
            missing.push("street");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.state.trim().is_empty() {
            missing.push("state");
        }
        if self.zip.trim().is_empty() {
            missing.push("zip");
        }
        missing
    }
}

/// Prize fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    WinnerNotified,
    AddressConfirmed,
    AddressInvalid,
    Shipped,
    Delivered,
    Forfeited,
}

impl FulfillmentStatus {
    pub fn allowed_targets(self) -> &'static [FulfillmentStatus] {
        match self {
            FulfillmentStatus::Pending => &[
                FulfillmentStatus::WinnerNotified,
                FulfillmentStatus::Forfeited,
            ],
            FulfillmentStatus::WinnerNotified => &[
                FulfillmentStatus::AddressConfirmed,
                FulfillmentStatus::AddressInvalid,
                FulfillmentStatus::Forfeited,
            ],
            FulfillmentStatus::AddressConfirmed => {
                &[FulfillmentStatus::Shipped, FulfillmentStatus::Forfeited]
            }
            FulfillmentStatus::AddressInvalid => &[
                FulfillmentStatus::AddressConfirmed,
                FulfillmentStatus::Forfeited,
            ],
            FulfillmentStatus::Shipped => {
                &[FulfillmentStatus::Delivered, FulfillmentStatus::Forfeited]
            }
            FulfillmentStatus::Delivered | FulfillmentStatus::Forfeited => &[],
        }
    }

    pub fn can_transition_to(self, target: FulfillmentStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Statuses still in flight, scanned by the timeout sweep.
    pub fn is_active(self) -> bool {
        !matches!(
            self,
            FulfillmentStatus::Delivered | FulfillmentStatus::Forfeited
        )
    }

    /// Timeout forfeiture applies only before the prize leaves the warehouse.
    pub fn forfeitable_on_timeout(self) -> bool {
        !matches!(
            self,
            FulfillmentStatus::Shipped
                | FulfillmentStatus::Delivered
                | FulfillmentStatus::Forfeited
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "pending",
            FulfillmentStatus::WinnerNotified => "winner_notified",
            FulfillmentStatus::AddressConfirmed => "address_confirmed",
            FulfillmentStatus::AddressInvalid => "address_invalid",
            FulfillmentStatus::Shipped => "shipped",
            FulfillmentStatus::Delivered => "delivered",
            FulfillmentStatus::Forfeited => "forfeited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FulfillmentStatus::Pending),
            "winner_notified" => Some(FulfillmentStatus::WinnerNotified),
            "address_confirmed" => Some(FulfillmentStatus::AddressConfirmed),
            "address_invalid" => Some(FulfillmentStatus::AddressInvalid),
            "shipped" => Some(FulfillmentStatus::Shipped),
            "delivered" => Some(FulfillmentStatus::Delivered),
            "forfeited" => Some(FulfillmentStatus::Forfeited),
            _ => None,
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const ALL: [FulfillmentStatus; 7] = [
        FulfillmentStatus::Pending,
        FulfillmentStatus::WinnerNotified,
        FulfillmentStatus::AddressConfirmed,
        FulfillmentStatus::AddressInvalid,
        FulfillmentStatus::Shipped,
        FulfillmentStatus::Delivered,
        FulfillmentStatus::Forfeited,
    ];

    #[test]
    fn transition_table_is_exact() {
        for from in ALL {
            for to in ALL {
                let expected = match (from, to) {
                    (FulfillmentStatus::Pending, FulfillmentStatus::WinnerNotified)
                    | (FulfillmentStatus::WinnerNotified, FulfillmentStatus::AddressConfirmed)
                    | (FulfillmentStatus::WinnerNotified, FulfillmentStatus::AddressInvalid)
                    | (FulfillmentStatus::AddressConfirmed, FulfillmentStatus::Shipped)
                    | (FulfillmentStatus::AddressInvalid, FulfillmentStatus::AddressConfirmed)
                    | (FulfillmentStatus::Shipped, FulfillmentStatus::Delivered) => true,
                    (from, FulfillmentStatus::Forfeited) => !from.is_terminal(),
                    _ => false,
                };
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn address_missing_fields() {
        let address = ShippingAddress {
            street: "1 Main St".into(),
            city: "".into(),
            state: "CA".into(),
            zip: "  ".into(),
        };
        assert_eq!(address.missing_fields(), vec!["city", "zip"]);
    }

    fn notified(at: OffsetDateTime) -> Fulfillment {
        let mut f = Fulfillment::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            at,
        );
        f.status = FulfillmentStatus::WinnerNotified;
        f.notified_at = Some(at);
        f
    }

    #[test]
    fn warning_after_seven_days() {
        let t0 = datetime!(2026-01-01 00:00 UTC);
        let f = notified(t0);
        assert!(!f.warning_due(t0 + Duration::days(6)));
        assert!(f.warning_due(t0 + Duration::days(7)));
        assert!(!f.forfeit_due(t0 + Duration::days(8)));
    }

    #[test]
    fn forfeit_after_fourteen_days() {
        let t0 = datetime!(2026-01-01 00:00 UTC);
        let mut f = notified(t0);
        assert!(f.forfeit_due(t0 + Duration::days(14)));

        // Shipped prizes are never timeout-forfeited.
        f.status = FulfillmentStatus::Shipped;
        assert!(!f.forfeit_due(t0 + Duration::days(30)));

        // A stuck address_invalid record still forfeits.
        f.status = FulfillmentStatus::AddressInvalid;
        assert!(f.forfeit_due(t0 + Duration::days(15)));
    }

    #[test]
    fn unnotified_pending_never_times_out() {
        let t0 = datetime!(2026-01-01 00:00 UTC);
        let f = Fulfillment::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            t0,
        );
        assert!(!f.forfeit_due(t0 + Duration::days(365)));
        assert!(!f.warning_due(t0 + Duration::days(365)));
    }
}
