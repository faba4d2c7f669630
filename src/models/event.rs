use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time view of an event as seen by admission control. Events are
/// owned by the catalog service; this subsystem only ever reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: Uuid,
    pub is_paid: bool,
    pub price: Decimal,
    pub platform_fee: Decimal,
    pub capacity: i32,
    pub start_time: DateTime<Utc>,
}

impl EventSnapshot {
    pub fn total_amount(&self) -> Decimal {
        self.price + self.platform_fee
    }
}
