use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{EventSnapshot, Ticket, TicketStatus};
use crate::store::{EventDirectory, TicketStore};
use crate::utils::error::TicketError;

const ACTIVE_UNIQ_INDEX: &str = "tickets_active_holder_uniq";

pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw row shape; status lives as TEXT in Postgres and is narrowed to
/// `TicketStatus` on the way out.
#[derive(Debug, FromRow)]
struct TicketRow {
    id: Uuid,
    event_id: Uuid,
    holder_id: Uuid,
    transaction_id: String,
    price: Decimal,
    platform_fee: Decimal,
    payment_method: String,
    status: String,
    qr_code: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = TicketError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let status = TicketStatus::from_str(&row.status).ok_or_else(|| {
            TicketError::Database(sqlx::Error::Decode(
                format!("unknown ticket status '{}'", row.status).into(),
            ))
        })?;

        Ok(Ticket {
            id: row.id,
            event_id: row.event_id,
            holder_id: row.holder_id,
            transaction_id: row.transaction_id,
            price: row.price,
            platform_fee: row.platform_fee,
            payment_method: row.payment_method,
            status,
            qr_code: row.qr_code,
            created_at: row.created_at,
            paid_at: row.paid_at,
            refunded_at: row.refunded_at,
            updated_at: row.updated_at,
        })
    }
}

const TICKET_COLUMNS: &str = "id, event_id, holder_id, transaction_id, price, platform_fee, \
     payment_method, status, qr_code, created_at, paid_at, refunded_at, updated_at";

fn is_duplicate_holder_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.constraint() == Some(ACTIVE_UNIQ_INDEX)
    )
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn create_pending(&self, ticket: Ticket, capacity: i32) -> Result<Ticket, TicketError> {
        let mut tx = self.pool.begin().await?;

        // Serialize admission per event: the capacity count and the insert
        // must observe each other, otherwise two requests can both see a
        // free seat and overshoot capacity.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(ticket.event_id.to_string())
            .execute(&mut *tx)
            .await?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE event_id = $1 AND status IN ('PENDING', 'PAID')",
        )
        .bind(ticket.event_id)
        .fetch_one(&mut *tx)
        .await?;

        if active >= capacity as i64 {
            return Err(TicketError::CapacityExceeded);
        }

        let insert = format!(
            "INSERT INTO tickets ({TICKET_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {TICKET_COLUMNS}"
        );
        let row: TicketRow = sqlx::query_as(&insert)
            .bind(ticket.id)
            .bind(ticket.event_id)
            .bind(ticket.holder_id)
            .bind(&ticket.transaction_id)
            .bind(ticket.price)
            .bind(ticket.platform_fee)
            .bind(&ticket.payment_method)
            .bind(ticket.status.as_str())
            .bind(&ticket.qr_code)
            .bind(ticket.created_at)
            .bind(ticket.paid_at)
            .bind(ticket.refunded_at)
            .bind(ticket.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_duplicate_holder_violation(&e) {
                    TicketError::DuplicateTicket
                } else {
                    TicketError::Database(e)
                }
            })?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_by_id(&self, ticket_id: Uuid) -> Result<Option<Ticket>, TicketError> {
        let query = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        let row: Option<TicketRow> = sqlx::query_as(&query)
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Ticket::try_from).transpose()
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Ticket>, TicketError> {
        let query = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE transaction_id = $1");
        let row: Option<TicketRow> = sqlx::query_as(&query)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Ticket::try_from).transpose()
    }

    async fn count_active_for_event(&self, event_id: Uuid) -> Result<i64, TicketError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE event_id = $1 AND status IN ('PENDING', 'PAID')",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn holder_has_active_ticket(
        &self,
        event_id: Uuid,
        holder_id: Uuid,
    ) -> Result<bool, TicketError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tickets \
             WHERE event_id = $1 AND holder_id = $2 AND status IN ('PENDING', 'PAID'))",
        )
        .bind(event_id)
        .bind(holder_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn mark_paid_if_pending(
        &self,
        transaction_id: &str,
        qr_code: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, TicketError> {
        // `WHERE status = 'PENDING'` is the idempotency guard: of two
        // racing deliveries exactly one sees a row, the other gets None.
        let query = format!(
            "UPDATE tickets SET status = 'PAID', qr_code = $2, paid_at = $3, updated_at = $3 \
             WHERE transaction_id = $1 AND status = 'PENDING' \
             RETURNING {TICKET_COLUMNS}"
        );
        let row: Option<TicketRow> = sqlx::query_as(&query)
            .bind(transaction_id)
            .bind(qr_code)
            .bind(paid_at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Ticket::try_from).transpose()
    }

    async fn mark_failed_if_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Ticket>, TicketError> {
        let query = format!(
            "UPDATE tickets SET status = 'FAILED', updated_at = $2 \
             WHERE transaction_id = $1 AND status = 'PENDING' \
             RETURNING {TICKET_COLUMNS}"
        );
        let row: Option<TicketRow> = sqlx::query_as(&query)
            .bind(transaction_id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Ticket::try_from).transpose()
    }

    async fn mark_refunded_if_paid(
        &self,
        ticket_id: Uuid,
        refunded_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, TicketError> {
        let query = format!(
            "UPDATE tickets SET status = 'REFUNDED', refunded_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'PAID' \
             RETURNING {TICKET_COLUMNS}"
        );
        let row: Option<TicketRow> = sqlx::query_as(&query)
            .bind(ticket_id)
            .bind(refunded_at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Ticket::try_from).transpose()
    }

    async fn tickets_for_holder(&self, holder_id: Uuid) -> Result<Vec<Ticket>, TicketError> {
        let query = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE holder_id = $1 \
             ORDER BY paid_at DESC NULLS LAST, created_at DESC"
        );
        let rows: Vec<TicketRow> = sqlx::query_as(&query)
            .bind(holder_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Ticket::try_from).collect()
    }
}

pub struct PgEventDirectory {
    pool: PgPool,
}

impl PgEventDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    is_paid: bool,
    price: Decimal,
    platform_fee: Decimal,
    capacity: i32,
    start_time: DateTime<Utc>,
}

#[async_trait]
impl EventDirectory for PgEventDirectory {
    async fn get_event(&self, event_id: Uuid) -> Result<Option<EventSnapshot>, TicketError> {
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT id, is_paid, price, platform_fee, capacity, start_time \
             FROM events WHERE id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|e| EventSnapshot {
            id: e.id,
            is_paid: e.is_paid,
            price: e.price,
            platform_fee: e.platform_fee,
            capacity: e.capacity,
            start_time: e.start_time,
        }))
    }
}
