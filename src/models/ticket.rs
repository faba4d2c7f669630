use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of a ticket. `Pending` is the only state a ticket is
/// created in; every transition out of it is owned by exactly one service
/// (webhook processor, refund processor, or the external check-in desk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    Used,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Paid => "PAID",
            TicketStatus::Failed => "FAILED",
            TicketStatus::Refunded => "REFUNDED",
            TicketStatus::Used => "USED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TicketStatus::Pending),
            "PAID" => Some(TicketStatus::Paid),
            "FAILED" => Some(TicketStatus::Failed),
            "REFUNDED" => Some(TicketStatus::Refunded),
            "USED" => Some(TicketStatus::Used),
            _ => None,
        }
    }

    /// A ticket in one of these states holds a seat: it counts against
    /// capacity and blocks a second purchase by the same holder.
    pub fn is_active(&self) -> bool {
        matches!(self, TicketStatus::Pending | TicketStatus::Paid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub holder_id: Uuid,
    pub transaction_id: String,
    pub price: Decimal,
    pub platform_fee: Decimal,
    pub payment_method: String,
    pub status: TicketStatus,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// The amount confirmed at intent-creation time. Immutable for the
    /// life of the ticket.
    pub fn total_amount(&self) -> Decimal {
        self.price + self.platform_fee
    }
}

/// The shape returned to API callers. Holds foreign keys only; any
/// denormalized event/holder fields are joined at the read boundary, never
/// embedded in the stored record.
#[derive(Debug, Clone, Serialize)]
pub struct TicketView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub holder_id: Uuid,
    pub transaction_id: String,
    pub price: Decimal,
    pub platform_fee: Decimal,
    pub payment_method: String,
    pub status: TicketStatus,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl From<Ticket> for TicketView {
    fn from(t: Ticket) -> Self {
        TicketView {
            id: t.id,
            event_id: t.event_id,
            holder_id: t.holder_id,
            transaction_id: t.transaction_id,
            price: t.price,
            platform_fee: t.platform_fee,
            payment_method: t.payment_method,
            status: t.status,
            qr_code: t.qr_code,
            created_at: t.created_at,
            paid_at: t.paid_at,
            refunded_at: t.refunded_at,
        }
    }
}

/// Gateway-facing view of a transaction. Collapses the internal lifecycle
/// onto the four states the payment gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GatewayStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl From<TicketStatus> for GatewayStatus {
    fn from(status: TicketStatus) -> Self {
        match status {
            TicketStatus::Pending => GatewayStatus::Pending,
            TicketStatus::Paid | TicketStatus::Used => GatewayStatus::Completed,
            TicketStatus::Failed => GatewayStatus::Failed,
            TicketStatus::Refunded => GatewayStatus::Refunded,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionStatusView {
    pub transaction_id: String,
    pub status: GatewayStatus,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Ticket> for TransactionStatusView {
    fn from(t: &Ticket) -> Self {
        TransactionStatusView {
            transaction_id: t.transaction_id.clone(),
            status: t.status.into(),
            amount: t.total_amount(),
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}
