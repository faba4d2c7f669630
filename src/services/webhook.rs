use chrono::Utc;
use serde::Deserialize;

use crate::models::{TicketStatus, TicketView};
use crate::services::payments::PaymentService;
use crate::services::qr::QrPayload;
use crate::utils::error::TicketError;

/// Outcome reported by the payment gateway for a previously created intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Success,
    Declined,
    Failed,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Success => "success",
            WebhookOutcome::Declined => "declined",
            WebhookOutcome::Failed => "failed",
        }
    }
}

impl PaymentService {
    /// The attestation the gateway is expected to send with a callback:
    /// HMAC over `<transaction_id>:<outcome>` under the shared webhook
    /// secret. Exposed so the gateway integration layer (and tests) build
    /// it from one place.
    pub fn webhook_attestation(&self, transaction_id: &str, outcome: WebhookOutcome) -> String {
        self.gateway_signer
            .sign(&attestation_message(transaction_id, outcome))
    }

    /// Applies a gateway callback to the ticket it references.
    ///
    /// The attestation is verified before anything is read or written; a
    /// bad signature means a potential forgery and must leave no trace on
    /// the ticket. The PENDING check plus the store's conditional update
    /// make redelivery a no-op: the second delivery of the same callback
    /// observes `AlreadyProcessed`, never a second QR.
    pub async fn process_webhook(
        &self,
        transaction_id: &str,
        outcome: WebhookOutcome,
        signature: &str,
    ) -> Result<TicketView, TicketError> {
        let message = attestation_message(transaction_id, outcome);
        if !self.gateway_signer.verify(&message, signature) {
            return Err(TicketError::InvalidSignature);
        }

        let ticket = self
            .store
            .find_by_transaction(transaction_id)
            .await?
            .ok_or(TicketError::TransactionNotFound)?;

        if ticket.status != TicketStatus::Pending {
            return Err(TicketError::AlreadyProcessed);
        }

        match outcome {
            WebhookOutcome::Success => {
                let issued_at = Utc::now();
                let payload = QrPayload {
                    ticket_id: ticket.id,
                    event_id: ticket.event_id,
                    holder_id: ticket.holder_id,
                    issued_at,
                };
                let qr_code = self.qr.issue(&payload)?;

                // A racing delivery can still win between the read above
                // and this update; zero rows affected means it did.
                let paid = self
                    .store
                    .mark_paid_if_pending(transaction_id, &qr_code, issued_at)
                    .await?
                    .ok_or(TicketError::AlreadyProcessed)?;

                tracing::info!(
                    ticket_id = %paid.id,
                    transaction_id = %transaction_id,
                    "payment confirmed, QR issued"
                );
                Ok(paid.into())
            }
            WebhookOutcome::Declined | WebhookOutcome::Failed => {
                // Retained as FAILED rather than deleted: terminal outcomes
                // keep their audit trail.
                self.store
                    .mark_failed_if_pending(transaction_id)
                    .await?
                    .ok_or(TicketError::AlreadyProcessed)?;

                tracing::warn!(
                    transaction_id = %transaction_id,
                    outcome = outcome.as_str(),
                    "payment declined by gateway"
                );
                Err(TicketError::PaymentDeclined)
            }
        }
    }
}

fn attestation_message(transaction_id: &str, outcome: WebhookOutcome) -> String {
    format!("{}:{}", transaction_id, outcome.as_str())
}
