use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{EventSnapshot, Ticket};
use crate::utils::error::TicketError;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryEventDirectory, InMemoryTicketStore};
pub use postgres::{PgEventDirectory, PgTicketStore};

/// Persistence contract for tickets. Admission (uniqueness + capacity) and
/// every status transition are pushed down here so they can be made atomic
/// at the storage layer; application-level read-then-write sequences are
/// not trusted for either.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Inserts a PENDING ticket as one atomic admission unit: the active
    /// count for the event and the (event, holder) uniqueness check happen
    /// in the same critical section as the insert. Rejects with
    /// `DuplicateTicket` or `CapacityExceeded`.
    async fn create_pending(&self, ticket: Ticket, capacity: i32) -> Result<Ticket, TicketError>;

    async fn find_by_id(&self, ticket_id: Uuid) -> Result<Option<Ticket>, TicketError>;

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Ticket>, TicketError>;

    /// Count of tickets in {PENDING, PAID} for the event.
    async fn count_active_for_event(&self, event_id: Uuid) -> Result<i64, TicketError>;

    async fn holder_has_active_ticket(
        &self,
        event_id: Uuid,
        holder_id: Uuid,
    ) -> Result<bool, TicketError>;

    /// Conditional transition PENDING -> PAID, populating the QR payload and
    /// paid timestamp. Returns `None` when the ticket is no longer PENDING,
    /// which callers must treat as an already-processed delivery.
    async fn mark_paid_if_pending(
        &self,
        transaction_id: &str,
        qr_code: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, TicketError>;

    /// Conditional transition PENDING -> FAILED. The row is retained for
    /// audit; declined payments are never deleted.
    async fn mark_failed_if_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Ticket>, TicketError>;

    /// Conditional transition PAID -> REFUNDED. Returns `None` when the
    /// ticket is no longer PAID (a concurrent refund or check-in won).
    async fn mark_refunded_if_paid(
        &self,
        ticket_id: Uuid,
        refunded_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, TicketError>;

    async fn tickets_for_holder(&self, holder_id: Uuid) -> Result<Vec<Ticket>, TicketError>;
}

/// Read-only lookup into the event catalog, which is owned elsewhere.
#[async_trait]
pub trait EventDirectory: Send + Sync {
    async fn get_event(&self, event_id: Uuid) -> Result<Option<EventSnapshot>, TicketError>;
}
