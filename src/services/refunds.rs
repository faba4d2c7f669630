use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{TicketStatus, TicketView};
use crate::services::payments::PaymentService;
use crate::services::{Caller, CallerRole};
use crate::utils::error::TicketError;

impl PaymentService {
    /// Refunds a PAID ticket, strictly before the event starts. Only the
    /// holder or an admin may refund. Idempotent by construction: a repeat
    /// call lands on `AlreadyRefunded`.
    pub async fn refund_ticket(
        &self,
        ticket_id: Uuid,
        caller: &Caller,
        reason: Option<&str>,
    ) -> Result<TicketView, TicketError> {
        self.refund_ticket_at(ticket_id, caller, reason, Utc::now())
            .await
    }

    /// Same as `refund_ticket` with an explicit clock, so the timing
    /// boundary against the event start can be pinned down exactly.
    pub async fn refund_ticket_at(
        &self,
        ticket_id: Uuid,
        caller: &Caller,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TicketView, TicketError> {
        let ticket = self
            .store
            .find_by_id(ticket_id)
            .await?
            .ok_or(TicketError::TicketNotFound)?;

        if ticket.holder_id != caller.user_id && caller.role != CallerRole::Admin {
            return Err(TicketError::Forbidden);
        }

        match ticket.status {
            TicketStatus::Refunded => return Err(TicketError::AlreadyRefunded),
            TicketStatus::Used => return Err(TicketError::AlreadyUsed),
            TicketStatus::Pending | TicketStatus::Failed => return Err(TicketError::NotPaid),
            TicketStatus::Paid => {}
        }

        let event = self
            .events
            .get_event(ticket.event_id)
            .await?
            .ok_or(TicketError::EventNotFound)?;

        // Strictly before: at the start instant the window is closed.
        if now >= event.start_time {
            return Err(TicketError::EventAlreadyStarted);
        }

        let refunded = match self.store.mark_refunded_if_paid(ticket_id, now).await? {
            Some(t) => t,
            // Lost a race with another refund or a check-in; re-read and
            // report what actually happened.
            None => {
                let current = self
                    .store
                    .find_by_id(ticket_id)
                    .await?
                    .ok_or(TicketError::TicketNotFound)?;
                return Err(match current.status {
                    TicketStatus::Refunded => TicketError::AlreadyRefunded,
                    TicketStatus::Used => TicketError::AlreadyUsed,
                    _ => TicketError::NotPaid,
                });
            }
        };

        tracing::info!(
            ticket_id = %ticket_id,
            requested_by = %caller.user_id,
            reason = reason.unwrap_or("none"),
            "ticket refunded"
        );

        Ok(refunded.into())
    }
}
