use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::utils::response::error as error_response;

/// Every failure the payment subsystem can report. Validation failures are
/// all-or-nothing: when one of these is returned, no ticket row was touched
/// (the one exception is `PaymentDeclined`, which records the FAILED
/// terminal state before surfacing).
#[derive(Debug, Error)]
pub enum TicketError {
    // Intent-creation path
    #[error("Event not found")]
    EventNotFound,

    #[error("Event is not a paid event")]
    EventNotPayable,

    #[error("You already have an active ticket for this event")]
    DuplicateTicket,

    #[error("Event is sold out")]
    CapacityExceeded,

    #[error("Amount does not match the ticket price")]
    AmountMismatch,

    // Webhook path
    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Transaction has already been processed")]
    AlreadyProcessed,

    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("Payment was declined by the gateway")]
    PaymentDeclined,

    // Refund path
    #[error("Ticket not found")]
    TicketNotFound,

    #[error("You don't have permission to access this ticket")]
    Forbidden,

    #[error("Ticket has already been refunded")]
    AlreadyRefunded,

    #[error("Ticket has already been used")]
    AlreadyUsed,

    #[error("Only paid tickets can be refunded")]
    NotPaid,

    #[error("Refunds are not available once the event has started")]
    EventAlreadyStarted,

    // Operational
    #[error("QR signing key is not configured")]
    SigningKeyMissing,

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(String),
}

impl TicketError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TicketError::EventNotFound
            | TicketError::TransactionNotFound
            | TicketError::TicketNotFound => StatusCode::NOT_FOUND,
            TicketError::EventNotPayable
            | TicketError::AmountMismatch
            | TicketError::NotPaid
            | TicketError::EventAlreadyStarted => StatusCode::BAD_REQUEST,
            TicketError::DuplicateTicket
            | TicketError::CapacityExceeded
            | TicketError::AlreadyProcessed
            | TicketError::AlreadyRefunded
            | TicketError::AlreadyUsed => StatusCode::CONFLICT,
            TicketError::InvalidSignature => StatusCode::UNAUTHORIZED,
            TicketError::Forbidden => StatusCode::FORBIDDEN,
            TicketError::PaymentDeclined => StatusCode::PAYMENT_REQUIRED,
            TicketError::SigningKeyMissing
            | TicketError::Database(_)
            | TicketError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TicketError::EventNotFound => "EVENT_NOT_FOUND",
            TicketError::EventNotPayable => "EVENT_NOT_PAYABLE",
            TicketError::DuplicateTicket => "DUPLICATE_TICKET",
            TicketError::CapacityExceeded => "CAPACITY_EXCEEDED",
            TicketError::AmountMismatch => "AMOUNT_MISMATCH",
            TicketError::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            TicketError::AlreadyProcessed => "ALREADY_PROCESSED",
            TicketError::InvalidSignature => "INVALID_SIGNATURE",
            TicketError::PaymentDeclined => "PAYMENT_DECLINED",
            TicketError::TicketNotFound => "TICKET_NOT_FOUND",
            TicketError::Forbidden => "FORBIDDEN",
            TicketError::AlreadyRefunded => "ALREADY_REFUNDED",
            TicketError::AlreadyUsed => "ALREADY_USED",
            TicketError::NotPaid => "NOT_PAID",
            TicketError::EventAlreadyStarted => "EVENT_ALREADY_STARTED",
            TicketError::SigningKeyMissing => "SIGNING_KEY_MISSING",
            TicketError::Database(_) => "DATABASE_ERROR",
            TicketError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            // Forgery indicator: never swallowed silently.
            TicketError::InvalidSignature => {
                error!(code = self.code(), "webhook signature verification failed");
            }
            TicketError::SigningKeyMissing => {
                error!(code = self.code(), "signing key missing at issuance time");
            }
            TicketError::Database(e) => {
                error!(error = ?e, "database error");
            }
            TicketError::Internal(msg) => {
                error!(message = %msg, "internal error");
            }
            // Expected duplicate delivery; distinguishable in logs but not
            // an incident.
            TicketError::AlreadyProcessed => {
                warn!(code = self.code(), "duplicate webhook delivery");
            }
            other => {
                warn!(code = other.code(), message = %other, "request rejected");
            }
        }
    }
}

impl IntoResponse for TicketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Internal detail stays in the logs; clients get the stable message.
        let public_message = match &self {
            TicketError::Database(_) => "A database error occurred".to_string(),
            TicketError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        error_response(code, public_message, status)
    }
}

/// Errors that can only occur while the process is starting up.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_rejections_map_to_conflict() {
        assert_eq!(TicketError::DuplicateTicket.status_code(), StatusCode::CONFLICT);
        assert_eq!(TicketError::CapacityExceeded.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn signature_failure_is_unauthorized() {
        assert_eq!(
            TicketError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(TicketError::InvalidSignature.code(), "INVALID_SIGNATURE");
    }
}
