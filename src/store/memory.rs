use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{EventSnapshot, Ticket, TicketStatus};
use crate::store::{EventDirectory, TicketStore};
use crate::utils::error::TicketError;

/// Ticket store backed by a single mutex-guarded map. Holding the lock for
/// the whole of each operation gives the same atomicity the Postgres store
/// gets from transactions and conditional updates, which is what makes this
/// implementation honest enough to back the concurrency tests.
#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: Mutex<HashMap<Uuid, Ticket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create_pending(&self, ticket: Ticket, capacity: i32) -> Result<Ticket, TicketError> {
        let mut tickets = self.tickets.lock().await;

        let duplicate = tickets.values().any(|t| {
            t.event_id == ticket.event_id
                && t.holder_id == ticket.holder_id
                && t.status.is_active()
        });
        if duplicate {
            return Err(TicketError::DuplicateTicket);
        }

        let active = tickets
            .values()
            .filter(|t| t.event_id == ticket.event_id && t.status.is_active())
            .count() as i64;
        if active >= capacity as i64 {
            return Err(TicketError::CapacityExceeded);
        }

        tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn find_by_id(&self, ticket_id: Uuid) -> Result<Option<Ticket>, TicketError> {
        Ok(self.tickets.lock().await.get(&ticket_id).cloned())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Ticket>, TicketError> {
        Ok(self
            .tickets
            .lock()
            .await
            .values()
            .find(|t| t.transaction_id == transaction_id)
            .cloned())
    }

    async fn count_active_for_event(&self, event_id: Uuid) -> Result<i64, TicketError> {
        Ok(self
            .tickets
            .lock()
            .await
            .values()
            .filter(|t| t.event_id == event_id && t.status.is_active())
            .count() as i64)
    }

    async fn holder_has_active_ticket(
        &self,
        event_id: Uuid,
        holder_id: Uuid,
    ) -> Result<bool, TicketError> {
        Ok(self
            .tickets
            .lock()
            .await
            .values()
            .any(|t| t.event_id == event_id && t.holder_id == holder_id && t.status.is_active()))
    }

    async fn mark_paid_if_pending(
        &self,
        transaction_id: &str,
        qr_code: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, TicketError> {
        let mut tickets = self.tickets.lock().await;
        let ticket = tickets
            .values_mut()
            .find(|t| t.transaction_id == transaction_id && t.status == TicketStatus::Pending);

        Ok(ticket.map(|t| {
            t.status = TicketStatus::Paid;
            t.qr_code = Some(qr_code.to_string());
            t.paid_at = Some(paid_at);
            t.updated_at = paid_at;
            t.clone()
        }))
    }

    async fn mark_failed_if_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Ticket>, TicketError> {
        let mut tickets = self.tickets.lock().await;
        let ticket = tickets
            .values_mut()
            .find(|t| t.transaction_id == transaction_id && t.status == TicketStatus::Pending);

        Ok(ticket.map(|t| {
            t.status = TicketStatus::Failed;
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn mark_refunded_if_paid(
        &self,
        ticket_id: Uuid,
        refunded_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, TicketError> {
        let mut tickets = self.tickets.lock().await;
        let ticket = tickets
            .get_mut(&ticket_id)
            .filter(|t| t.status == TicketStatus::Paid);

        Ok(ticket.map(|t| {
            t.status = TicketStatus::Refunded;
            t.refunded_at = Some(refunded_at);
            t.updated_at = refunded_at;
            t.clone()
        }))
    }

    async fn tickets_for_holder(&self, holder_id: Uuid) -> Result<Vec<Ticket>, TicketError> {
        let tickets = self.tickets.lock().await;
        let mut owned: Vec<Ticket> = tickets
            .values()
            .filter(|t| t.holder_id == holder_id)
            .cloned()
            .collect();
        // Same order the Postgres store produces: paid_at DESC NULLS LAST,
        // created_at DESC.
        owned.sort_by(|a, b| match (&a.paid_at, &b.paid_at) {
            (Some(a_paid), Some(b_paid)) => b_paid
                .cmp(a_paid)
                .then_with(|| b.created_at.cmp(&a.created_at)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.created_at.cmp(&a.created_at),
        });
        Ok(owned)
    }
}

#[derive(Default)]
pub struct InMemoryEventDirectory {
    events: Mutex<HashMap<Uuid, EventSnapshot>>,
}

impl InMemoryEventDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, event: EventSnapshot) {
        self.events.lock().await.insert(event.id, event);
    }
}

#[async_trait]
impl EventDirectory for InMemoryEventDirectory {
    async fn get_event(&self, event_id: Uuid) -> Result<Option<EventSnapshot>, TicketError> {
        Ok(self.events.lock().await.get(&event_id).cloned())
    }
}
