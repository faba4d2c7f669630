use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::services::{Caller, WebhookOutcome};
use crate::state::AppState;
use crate::utils::error::TicketError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub event_id: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub platform_fee: Option<Decimal>,
    pub payment_method: String,
}

pub async fn create_payment(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Response, TicketError> {
    // Clients either send the full amount or split out the fee; both must
    // add up to the confirmed price either way.
    let proposed = req.amount + req.platform_fee.unwrap_or_default();

    let intent = state
        .payments
        .create_payment(req.event_id, caller.user_id, proposed, &req.payment_method)
        .await?;

    let message = intent.message.clone();
    Ok(created(intent, message))
}

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub transaction_id: String,
    pub status: WebhookOutcome,
    pub signature: String,
}

pub async fn process_webhook(
    State(state): State<AppState>,
    Json(req): Json<WebhookRequest>,
) -> Result<Response, TicketError> {
    match state
        .payments
        .process_webhook(&req.transaction_id, req.status, &req.signature)
        .await
    {
        Ok(ticket) => Ok(success(ticket, "Payment confirmed")),
        // Duplicate deliveries get a success-shaped ack so the gateway
        // stops retrying; the log line keeps them distinguishable.
        Err(TicketError::AlreadyProcessed) => {
            tracing::info!(
                transaction_id = %req.transaction_id,
                "duplicate webhook delivery acknowledged"
            );
            Ok(empty_success("Webhook already processed"))
        }
        Err(e) => Err(e),
    }
}

pub async fn get_transaction_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Response, TicketError> {
    let status = state.payments.transaction_status(&transaction_id).await?;
    Ok(success(status, "Transaction status fetched"))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, TicketError> {
    let ticket = state.payments.get_ticket(ticket_id, &caller).await?;
    Ok(success(ticket, "Ticket fetched"))
}

pub async fn get_my_tickets(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Response, TicketError> {
    let tickets = state.payments.my_tickets(caller.user_id).await?;
    Ok(success(tickets, "Tickets fetched"))
}

#[derive(Debug, Deserialize, Default)]
pub struct RefundRequest {
    pub reason: Option<String>,
}

pub async fn refund_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> Result<Response, TicketError> {
    let ticket = state
        .payments
        .refund_ticket(ticket_id, &caller, req.reason.as_deref())
        .await?;
    Ok(success(ticket, "Ticket refunded successfully"))
}
