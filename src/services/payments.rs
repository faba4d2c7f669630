use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Ticket, TicketStatus, TicketView, TransactionStatusView};
use crate::services::eligibility::check_eligibility;
use crate::services::qr::QrIssuer;
use crate::services::signing::HmacSigner;
use crate::services::{Caller, CallerRole};
use crate::store::{EventDirectory, TicketStore};
use crate::utils::error::TicketError;

/// Orchestrates the ticket payment lifecycle over the store and the event
/// directory. Handlers hold one of these behind an `Arc`; every method is
/// safe under concurrent requests because the invariants live in the store.
pub struct PaymentService {
    pub(crate) store: Arc<dyn TicketStore>,
    pub(crate) events: Arc<dyn EventDirectory>,
    pub(crate) qr: QrIssuer,
    pub(crate) gateway_signer: HmacSigner,
    checkout_base_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub transaction_id: String,
    pub redirect_url: String,
    pub message: String,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        events: Arc<dyn EventDirectory>,
        qr_signer: HmacSigner,
        gateway_signer: HmacSigner,
        checkout_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            events,
            qr: QrIssuer::new(qr_signer),
            gateway_signer,
            checkout_base_url: checkout_base_url.into(),
        }
    }

    pub fn qr_issuer(&self) -> &QrIssuer {
        &self.qr
    }

    /// Creates a PENDING ticket and hands back the gateway redirect. On any
    /// rejection nothing is written. The store's admission unit has the
    /// final say on uniqueness and capacity; the eligibility check up front
    /// only rejects early.
    pub async fn create_payment(
        &self,
        event_id: Uuid,
        holder_id: Uuid,
        proposed_amount: Decimal,
        payment_method: &str,
    ) -> Result<PaymentIntent, TicketError> {
        let event = self
            .events
            .get_event(event_id)
            .await?
            .ok_or(TicketError::EventNotFound)?;

        let active = self.store.count_active_for_event(event_id).await?;
        let has_active = self
            .store
            .holder_has_active_ticket(event_id, holder_id)
            .await?;
        check_eligibility(&event, active, has_active, proposed_amount)?;

        let now = Utc::now();
        let transaction_id = new_transaction_id(now);
        let ticket = Ticket {
            id: Uuid::new_v4(),
            event_id,
            holder_id,
            transaction_id: transaction_id.clone(),
            price: event.price,
            platform_fee: event.platform_fee,
            payment_method: payment_method.to_string(),
            status: TicketStatus::Pending,
            qr_code: None,
            created_at: now,
            paid_at: None,
            refunded_at: None,
            updated_at: now,
        };

        let ticket = self.store.create_pending(ticket, event.capacity).await?;

        tracing::info!(
            ticket_id = %ticket.id,
            event_id = %event_id,
            transaction_id = %transaction_id,
            amount = %ticket.total_amount(),
            "payment intent created"
        );

        Ok(PaymentIntent {
            redirect_url: format!("{}/checkout/{}", self.checkout_base_url, transaction_id),
            transaction_id,
            message: "Payment initiated. Complete checkout to receive your ticket.".to_string(),
        })
    }

    pub async fn get_ticket(
        &self,
        ticket_id: Uuid,
        caller: &Caller,
    ) -> Result<TicketView, TicketError> {
        let ticket = self
            .store
            .find_by_id(ticket_id)
            .await?
            .ok_or(TicketError::TicketNotFound)?;

        if ticket.holder_id != caller.user_id && caller.role != CallerRole::Admin {
            return Err(TicketError::Forbidden);
        }

        Ok(ticket.into())
    }

    /// Tickets the holder can actually use: PAID and USED only, newest
    /// purchase first. Pending intents and terminal failures are noise
    /// from the holder's point of view.
    pub async fn my_tickets(&self, holder_id: Uuid) -> Result<Vec<TicketView>, TicketError> {
        let mut tickets: Vec<Ticket> = self
            .store
            .tickets_for_holder(holder_id)
            .await?
            .into_iter()
            .filter(|t| matches!(t.status, TicketStatus::Paid | TicketStatus::Used))
            .collect();

        tickets.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(tickets.into_iter().map(TicketView::from).collect())
    }

    pub async fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatusView, TicketError> {
        let ticket = self
            .store
            .find_by_transaction(transaction_id)
            .await?
            .ok_or(TicketError::TransactionNotFound)?;

        Ok(TransactionStatusView::from(&ticket))
    }
}

/// Millisecond timestamp plus 64 bits of entropy; collisions are not a
/// practical concern and the UNIQUE constraint backstops them anyway.
fn new_transaction_id(now: DateTime<Utc>) -> String {
    format!("TXN-{}-{:016x}", now.timestamp_millis(), rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_carry_timestamp_and_entropy() {
        let now = Utc::now();
        let a = new_transaction_id(now);
        let b = new_transaction_id(now);
        assert!(a.starts_with("TXN-"));
        assert_ne!(a, b);
        // 16 hex chars of random suffix
        assert_eq!(a.rsplit('-').next().unwrap().len(), 16);
    }
}
